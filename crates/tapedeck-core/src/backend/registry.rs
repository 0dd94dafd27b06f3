//! Ordered backend lookup.

use regex::{ Regex, RegexBuilder };

use super::{ Backend, BackendError, BackendSpec, ControlChannel, ProgressFormat };
use crate::entry::PlaylistEntry;


/// Locations treated as video; skipped when adding unless video is enabled.
pub const RE_VIDEO: &str = r"\.(mkv|flv|avi|wmv|mp4)$";

const MPEG_OR_STREAM: &str = r"(^https?://|\.mp[123]$)";

const MPLAYER_FILES: &str = concat!(
    r"^https?://|\.(mp[1234]|ogg|oga|flac|spx|mp[cp+]|mod|xm|fm|s3m|",
    r"med|col|669|it|mtm|stm|aiff|au|cdr|wav|wma|m4a|m4b|",
    r"mkv|flv|avi|wmv)$",
);

const GST_FILES: &str = concat!(
    r"^https?://|\.(mp[1234]|ogg|opus|oga|flac|wav|m4a|m4b|aiff|",
    r"mkv|flv|avi|wmv)$",
);

const TRACKER_FILES: &str = r"\.(mod|xm|fm|s3m|med|col|669|it|mtm)$";


/// Backends in priority order; the first capable, installed one wins.
pub struct BackendRegistry {
    backends: Vec<Backend>,
    video: Regex,
    allow_video: bool,
}


impl BackendRegistry {
    /// Compiles a registry from descriptions, keeping their order.
    pub fn new( specs: Vec<BackendSpec> ) -> Result<Self, BackendError> {
        let backends = specs
            .into_iter()
            .map( Backend::from_spec )
            .collect::<Result<Vec<_>, _>>()?;
        let video = RegexBuilder::new( RE_VIDEO ).case_insensitive( true ).build()?;
        Ok( Self {
            backends,
            video,
            allow_video: false,
        })
    }


    /// Registry with the built-in player list.
    pub fn with_defaults() -> Result<Self, BackendError> {
        Self::new( Self::default_specs() )
    }


    /// The built-in player list, most preferred first.
    pub fn default_specs() -> Vec<BackendSpec> {
        use ProgressFormat::*;

        vec![
            BackendSpec::new( "ogg123 -q -v -k {offset} {file}", r"\.ogg$", 1.0, FrameOffset ),
            BackendSpec::new( "splay -f -k {offset} {file}", MPEG_OR_STREAM, 38.28, FrameOffset ),
            BackendSpec::new( "mpg123 -q -v -k {offset} {file}", MPEG_OR_STREAM, 38.28, FrameOffset ),
            BackendSpec::new( "mpg321 -q -v -k {offset} {file}", MPEG_OR_STREAM, 38.28, FrameOffset ),
            BackendSpec::new( "mppdec --gain 2 --start {offset} {file}", r"\.mp[cp+]$", 1.0, Mpp ),
            BackendSpec::new( "madplay -v --display-time=remaining -s {offset} {file}", r"\.mp[123]$", 1.0, TimeRemaining ),
            BackendSpec::new( "mplayer -slave -vc null -vo null {file}", MPLAYER_FILES, 1.0, MPlayer )
                .with_control( ControlChannel::Stdin ),
            BackendSpec::new( "gst123 -k {offset} {file}", GST_FILES, 1.0, Gst ),
            BackendSpec::new( "play {file} trim {offset}", r"\.(aiff|au|cdr|mp3|ogg|wav)$", 1.0, Sox ),
            BackendSpec::new( "ffplay -nodisp -autoexit -ss {offset} {file}", GST_FILES, 1.0, AvPlay ),
            BackendSpec::new( "avplay -nodisp -autoexit -ss {offset} {file}", GST_FILES, 1.0, AvPlay ),
            BackendSpec::new( "mikmod -q -p0 {file}", TRACKER_FILES, 1.0, NoOffset ),
            BackendSpec::new( "xmp -q {file}", r"\.(mod|xm|fm|s3m|med|col|669|it|mtm|stm)$", 1.0, NoOffset ),
            BackendSpec::new( "speexdec {file}", r"\.spx$", 1.0, NoOffset ),
            BackendSpec::new( "timidity {file}", r"\.(mid|rmi|rcp|r36|g18|g36|mfi|kar|mod|wrd)$", 1.0, NoOffset ),
            BackendSpec::new(
                "cvlc --play-and-exit --no-loop --start-time {offset} {file}",
                MPLAYER_FILES,
                1.0,
                WallClock,
            ),
        ]
    }


    /// Allows video files to be added to the playlist.
    pub fn set_allow_video( &mut self, allow: bool ) {
        self.allow_video = allow;
    }


    pub fn allow_video( &self ) -> bool {
        self.allow_video
    }


    /// Returns true if some backend pattern accepts the location.
    ///
    /// Installation is not checked here, only whether the file type is known.
    pub fn can_play( &self, location: &str ) -> bool {
        if !self.allow_video && self.video.is_match( location ) {
            return false;
        }
        self.backends.iter().any( |b| b.matches( location ) )
    }


    /// Index of the first backend that matches `entry` and is installed.
    pub fn pick_backend( &self, entry: &PlaylistEntry ) -> Option<usize> {
        let index = self
            .backends
            .iter()
            .position( |b| b.matches( &entry.location ) && b.is_installed() );
        match index {
            Some( i ) => tracing::debug!( "Picked {} for {}", self.backends[ i ].name(), entry.name ),
            None => tracing::debug!( "No backend for {}", entry.location ),
        }
        index
    }


    pub fn get( &self, index: usize ) -> Option<&Backend> {
        self.backends.get( index )
    }


    pub fn get_mut( &mut self, index: usize ) -> Option<&mut Backend> {
        self.backends.get_mut( index )
    }


    pub fn iter( &self ) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }


    pub fn len( &self ) -> usize {
        self.backends.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.backends.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::entry::EntryId;


    fn spec( command: &str, pattern: &str ) -> BackendSpec {
        BackendSpec::new( command, pattern, 1.0, ProgressFormat::NoOffset )
    }


    #[test]
    fn test_defaults_compile() {
        let registry = BackendRegistry::with_defaults().unwrap();
        assert_eq!( registry.len(), 16 );
        assert_eq!( registry.get( 0 ).map( |b| b.name() ), Some( "ogg123" ) );
    }


    #[test]
    fn test_can_play_by_pattern() {
        let mut registry = BackendRegistry::with_defaults().unwrap();
        assert!( registry.can_play( "/music/song.MP3" ) );
        assert!( registry.can_play( "http://radio.example/stream" ) );
        assert!( registry.can_play( "/music/tune.xm" ) );
        assert!( !registry.can_play( "/music/cover.jpg" ) );

        assert!( !registry.can_play( "/films/clip.mkv" ) );
        registry.set_allow_video( true );
        assert!( registry.can_play( "/films/clip.mkv" ) );
    }


    #[test]
    fn test_pick_skips_uninstalled() {
        let registry = BackendRegistry::new( vec![
            spec( "tapedeck-missing-player {file}", r"\.ogg$" ),
            spec( "tapedeck-missing-wav {file}", r"\.wav$" ),
            spec( "sleep 1", r"\.ogg$" ),
        ] ).unwrap();

        let ogg = PlaylistEntry::new( EntryId( 1 ), "/a.ogg" );
        let wav = PlaylistEntry::new( EntryId( 2 ), "/a.wav" );
        assert_eq!( registry.pick_backend( &ogg ), Some( 2 ) );
        assert_eq!( registry.pick_backend( &wav ), None );
    }


    #[test]
    fn test_invalid_pattern() {
        let result = BackendRegistry::new( vec![ spec( "sleep 1", "(" ) ] );
        assert!( matches!( result, Err( BackendError::Pattern( _ ) ) ) );
    }
}
