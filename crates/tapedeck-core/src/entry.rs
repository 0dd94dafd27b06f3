//! Playlist entries.
//!
//! An entry identifies one playable resource (a local path or a stream URL)
//! together with the per-entry flags the playlist and scheduler mutate.

use std::fmt;
use std::path::Path;

use serde::{ Deserialize, Serialize };


/// Stable identity of an entry for the lifetime of its playlist.
///
/// History containers store ids rather than indices so that reordering
/// the playlist never corrupts them.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize )]
pub struct EntryId( pub u64 );


impl fmt::Display for EntryId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// A single playable item in a playlist.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct PlaylistEntry {
    pub id: EntryId,

    /// Local path or `http(s)://` URL handed to the player program.
    pub location: String,

    /// Name shown in lists and status messages.
    pub name: String,

    /// Intrinsic start offset in seconds, for sub-track extraction.
    #[serde( default )]
    pub start: Option<f64>,

    /// Intrinsic end offset in seconds; playback is cut off here.
    #[serde( default )]
    pub end: Option<f64>,

    #[serde( default )]
    pub tagged: bool,

    #[serde( default )]
    pub active: bool,
}


impl PlaylistEntry {
    /// Creates an untagged, inactive entry for the given location.
    pub fn new( id: EntryId, location: impl Into<String> ) -> Self {
        let location = location.into();
        let name = display_name( &location );
        Self {
            id,
            location,
            name,
            start: None,
            end: None,
            tagged: false,
            active: false,
        }
    }


    /// Restricts playback to `[start, end)` of the underlying resource.
    pub fn with_range( mut self, start: Option<f64>, end: Option<f64> ) -> Self {
        self.start = start;
        self.end = end;
        self
    }


    /// Returns true if the location is a network stream.
    pub fn is_url( &self ) -> bool {
        is_url( &self.location )
    }


    /// Offset of the sub-track within the resource (0 for whole files).
    pub fn start_offset( &self ) -> f64 {
        self.start.unwrap_or( 0.0 ).max( 0.0 )
    }


    /// Length of the sub-track, if the entry carries an end offset.
    pub fn range_length( &self ) -> Option<f64> {
        self.end.map( |end| ( end - self.start_offset() ).max( 0.0 ) )
    }
}


impl fmt::Display for PlaylistEntry {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.name )
    }
}


/// Returns true for `http://` and `https://` locations.
pub fn is_url( location: &str ) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with( "http://" ) || lower.starts_with( "https://" )
}


/// Normalizes a stream URL so the host is always followed by a slash.
pub fn fix_url( url: &str ) -> String {
    if !is_url( url ) {
        return url.to_string();
    }
    let scheme_end = url.find( "://" ).map( |i| i + 3 ).unwrap_or( 0 );
    match url[ scheme_end.. ].find( '/' ) {
        Some( _ ) => url.to_string(),
        None => format!( "{}/", url ),
    }
}


fn display_name( location: &str ) -> String {
    if is_url( location ) {
        return location.to_string();
    }
    Path::new( location )
        .file_name()
        .map( |n| n.to_string_lossy().to_string() )
        .filter( |n| !n.is_empty() )
        .unwrap_or_else( || location.to_string() )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_display_name_uses_file_name() {
        let entry = PlaylistEntry::new( EntryId( 1 ), "/music/album/01 - intro.flac" );
        assert_eq!( entry.name, "01 - intro.flac" );
        assert!( !entry.is_url() );
    }


    #[test]
    fn test_display_name_keeps_urls() {
        let entry = PlaylistEntry::new( EntryId( 2 ), "http://radio.example:8000/live" );
        assert_eq!( entry.name, "http://radio.example:8000/live" );
        assert!( entry.is_url() );
    }


    #[test]
    fn test_fix_url_appends_slash_after_host() {
        assert_eq!( fix_url( "http://radio.example:8000" ), "http://radio.example:8000/" );
        assert_eq!( fix_url( "https://radio.example/stream" ), "https://radio.example/stream" );
        assert_eq!( fix_url( "/local/file.ogg" ), "/local/file.ogg" );
    }


    #[test]
    fn test_range_length() {
        let entry = PlaylistEntry::new( EntryId( 3 ), "/cd.flac" ).with_range( Some( 60.0 ), Some( 245.0 ) );
        assert_eq!( entry.start_offset(), 60.0 );
        assert_eq!( entry.range_length(), Some( 185.0 ) );
    }
}
