//! Playlist management
//!
//! Owns the ordered entry list, tag state and the [`Scheduler`] that decides
//! which entry plays next. Every public operation here is an entry point for
//! input handlers or the remote-control channel.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };

use rand::seq::SliceRandom;
use regex::Regex;
use thiserror::Error;

use crate::backend::BackendRegistry;
use crate::entry::{ fix_url, is_url, EntryId, PlaylistEntry };
use crate::library::{ LibraryError, LibraryScanner };
use crate::scheduler::{ Direction, Scheduler };


/// Errors that can occur with playlist operations.
#[derive( Debug, Error )]
pub enum PlaylistError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Library error: {0}" )]
    Library( #[from] LibraryError ),
}


/// Ordered list of entries plus the advancement policy.
#[derive( Debug, Default )]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    next_id: u64,
    scheduler: Scheduler,
    // Do not auto-advance when the current track finishes.
    stop_after: bool,
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates an empty playlist driven by the given scheduler.
    pub fn with_scheduler( scheduler: Scheduler ) -> Self {
        Self {
            scheduler,
            ..Self::default()
        }
    }


    pub fn entries( &self ) -> &[ PlaylistEntry ] {
        &self.entries
    }


    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    pub fn get( &self, index: usize ) -> Option<&PlaylistEntry> {
        self.entries.get( index )
    }


    pub fn index_of( &self, id: EntryId ) -> Option<usize> {
        self.entries.iter().position( |e| e.id == id )
    }


    pub fn scheduler( &self ) -> &Scheduler {
        &self.scheduler
    }


    /// Appends a location (path or URL) without checking playability.
    ///
    /// @param location - Local path or stream URL
    ///
    /// @returns The id of the new entry
    pub fn add( &mut self, location: impl Into<String> ) -> EntryId {
        let id = self.allocate_id();
        self.push( PlaylistEntry::new( id, location ) )
    }


    /// Appends a sub-track of a resource bounded by start/end offsets.
    pub fn add_range( &mut self, location: impl Into<String>, start: Option<f64>, end: Option<f64> ) -> EntryId {
        let entry = PlaylistEntry::new( self.allocate_id(), location ).with_range( start, end );
        self.push( entry )
    }


    /// Adds a path or URL, walking directories recursively.
    ///
    /// Only files some backend in `registry` can play are added.
    ///
    /// @param location - File, directory or stream URL
    /// @param registry - Used to decide which files are playable
    ///
    /// @returns The number of entries added
    pub fn add_location( &mut self, location: &str, registry: &BackendRegistry ) -> Result<usize, PlaylistError> {
        if is_url( location ) {
            self.add( fix_url( location ) );
            return Ok( 1 );
        }
        self.add_path( Path::new( location ), registry )
    }


    /// Adds a file, or every playable file below a directory in sorted order.
    pub fn add_path( &mut self, path: &Path, registry: &BackendRegistry ) -> Result<usize, PlaylistError> {
        if !path.exists() {
            return Err( PlaylistError::NotFound( path.to_path_buf() ) );
        }

        let files = if path.is_dir() {
            let mut scanner = LibraryScanner::new();
            scanner.add_root( path.to_path_buf() );
            scanner.scan( |p| registry.can_play( &p.to_string_lossy() ) )?
        } else if registry.can_play( &path.to_string_lossy() ) {
            vec![ path.to_path_buf() ]
        } else {
            Vec::new()
        };

        let count = files.len();
        for file in files {
            self.add( file.to_string_lossy().to_string() );
        }
        tracing::debug!( "Added {} entries from {}", count, path.display() );
        Ok( count )
    }


    fn allocate_id( &mut self ) -> EntryId {
        self.next_id += 1;
        EntryId( self.next_id )
    }


    fn push( &mut self, mut entry: PlaylistEntry ) -> EntryId {
        let id = entry.id;
        entry.active = false;
        self.scheduler.entry_added( id );
        self.entries.push( entry );
        id
    }


    /// Removes every entry and resets history.
    pub fn clear( &mut self ) {
        self.entries.clear();
        self.scheduler.reset_history();
    }


    /// Deletes the tagged entries, or the entry under `cursor` if none is tagged.
    ///
    /// @returns The number of entries removed
    pub fn delete( &mut self, cursor: usize ) -> usize {
        let before = self.entries.len();
        if self.entries.iter().any( |e| e.tagged ) {
            self.entries.retain( |e| !e.tagged );
        } else if cursor < self.entries.len() {
            self.entries.remove( cursor );
        }
        self.forget_removed();
        before - self.entries.len()
    }


    fn forget_removed( &mut self ) {
        let alive: HashSet<EntryId> = self.entries.iter().map( |e| e.id ).collect();
        self.scheduler.retain( &alive );
    }


    /// Moves all tagged entries next to the entry under `cursor`.
    ///
    /// Nothing happens if no entry is tagged or the cursor entry is itself tagged.
    ///
    /// @param cursor - Index of the anchor entry
    /// @param after - Insert after the anchor instead of before it
    ///
    /// @returns The new index of the anchor entry
    pub fn move_tagged( &mut self, cursor: usize, after: bool ) -> Option<usize> {
        let anchor = self.entries.get( cursor )?;
        if anchor.tagged || !self.entries.iter().any( |e| e.tagged ) {
            return None;
        }
        let anchor_id = anchor.id;

        let ( tagged, mut rest ): ( Vec<_>, Vec<_> ) = self.entries.drain( .. ).partition( |e| e.tagged );
        let mut anchor_index = rest.iter().position( |e| e.id == anchor_id )?;
        let insert_at = if after { anchor_index + 1 } else { anchor_index };
        if !after {
            anchor_index += tagged.len();
        }
        rest.splice( insert_at..insert_at, tagged );
        self.entries = rest;
        Some( anchor_index )
    }


    /// Randomizes the list order. Random-mode history is unaffected.
    pub fn shuffle( &mut self ) {
        self.entries.shuffle( &mut rand::thread_rng() );
    }


    /// Sorts entries by display name, then location.
    pub fn sort( &mut self ) {
        self.entries.sort_by( |a, b| {
            a.name.to_lowercase().cmp( &b.name.to_lowercase() ).then_with( || a.location.cmp( &b.location ) )
        });
    }


    pub fn tag( &mut self, index: usize, tagged: bool ) {
        if let Some( entry ) = self.entries.get_mut( index ) {
            entry.tagged = tagged;
        }
    }


    pub fn toggle_tag( &mut self, index: usize ) {
        if let Some( entry ) = self.entries.get_mut( index ) {
            entry.tagged = !entry.tagged;
        }
    }


    pub fn invert_tags( &mut self ) {
        for entry in &mut self.entries {
            entry.tagged = !entry.tagged;
        }
    }


    /// Tags (or untags) every entry whose name matches `pattern`.
    ///
    /// @returns The number of entries matched
    pub fn tag_matching( &mut self, pattern: &Regex, tagged: bool ) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter( |e| pattern.is_match( &e.name ) ) {
            entry.tagged = tagged;
            count += 1;
        }
        count
    }


    pub fn tagged_count( &self ) -> usize {
        self.entries.iter().filter( |e| e.tagged ).count()
    }


    pub fn repeat( &self ) -> bool {
        self.scheduler.repeat()
    }


    pub fn random( &self ) -> bool {
        self.scheduler.random()
    }


    /// Returns true if playback should halt after the current track.
    pub fn stop_after( &self ) -> bool {
        self.stop_after
    }


    pub fn set_repeat( &mut self, repeat: bool ) {
        self.scheduler.set_repeat( repeat );
    }


    pub fn set_random( &mut self, random: bool ) {
        self.scheduler.set_random( random, &self.entries );
    }


    pub fn toggle_repeat( &mut self ) -> bool {
        let repeat = !self.repeat();
        self.set_repeat( repeat );
        repeat
    }


    pub fn toggle_random( &mut self ) -> bool {
        let random = !self.random();
        self.set_random( random );
        random
    }


    pub fn toggle_stop( &mut self ) -> bool {
        self.stop_after = !self.stop_after;
        self.stop_after
    }


    pub fn active( &self ) -> Option<&PlaylistEntry> {
        self.entries.iter().find( |e| e.active )
    }


    /// Index of the active entry, for moving the list cursor onto it.
    pub fn jump_to_active( &self ) -> Option<usize> {
        self.entries.iter().position( |e| e.active )
    }


    /// Makes the entry at `index` the active one.
    pub fn set_active( &mut self, index: usize ) -> Option<PlaylistEntry> {
        let id = self.entries.get( index )?.id;
        for entry in &mut self.entries {
            entry.active = entry.id == id;
        }
        self.scheduler.visit( id );
        self.entries.get( index ).cloned()
    }


    /// Moves the active flag according to the scheduling policy.
    pub fn advance( &mut self, direction: Direction ) -> Option<PlaylistEntry> {
        let id = self.scheduler.advance( &mut self.entries, direction )?;
        self.index_of( id ).and_then( |i| self.entries.get( i ) ).cloned()
    }


    /// Replaces the whole list, e.g. from a resume file.
    ///
    /// Ids are kept; the id counter continues after the highest one.
    pub fn restore( &mut self, entries: Vec<PlaylistEntry>, repeat: bool, random: bool ) {
        self.next_id = entries.iter().map( |e| e.id.0 ).max().unwrap_or( 0 );
        self.entries = entries;
        let mut seen_active = false;
        for entry in &mut self.entries {
            entry.active = entry.active && !seen_active;
            seen_active |= entry.active;
        }
        self.scheduler.set_repeat( repeat );
        self.scheduler.set_random( random, &self.entries );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn playlist( names: &[ &str ] ) -> Playlist {
        let mut playlist = Playlist::with_scheduler( Scheduler::with_seed( 4 ) );
        for name in names {
            playlist.add( format!( "/music/{}", name ) );
        }
        playlist
    }


    fn names( playlist: &Playlist ) -> Vec<&str> {
        playlist.entries().iter().map( |e| e.name.as_str() ).collect()
    }


    #[test]
    fn test_add_assigns_unique_ids() {
        let mut playlist = Playlist::new();
        let a = playlist.add( "/a.ogg" );
        let b = playlist.add( "/b.ogg" );

        assert_ne!( a, b );
        assert_eq!( playlist.len(), 2 );
        assert_eq!( playlist.index_of( b ), Some( 1 ) );
    }


    #[test]
    fn test_delete_cursor_entry() {
        let mut playlist = playlist( &[ "a", "b", "c" ] );
        assert_eq!( playlist.delete( 1 ), 1 );
        assert_eq!( names( &playlist ), vec![ "a", "c" ] );
        assert_eq!( playlist.delete( 10 ), 0 );
    }


    #[test]
    fn test_delete_prefers_tagged_entries() {
        let mut playlist = playlist( &[ "a", "b", "c", "d" ] );
        playlist.tag( 0, true );
        playlist.tag( 2, true );

        assert_eq!( playlist.delete( 1 ), 2 );
        assert_eq!( names( &playlist ), vec![ "b", "d" ] );
    }


    #[test]
    fn test_delete_filters_random_history() {
        let mut playlist = playlist( &[ "a", "b", "c" ] );
        playlist.set_random( true );
        let first = playlist.advance( Direction::Forward ).map( |e| e.id );
        let index = first.and_then( |id| playlist.index_of( id ) ).unwrap();

        playlist.delete( index );
        assert!( first.map_or( false, |id| !playlist.scheduler().history().contains( &id ) ) );
        assert_eq!( playlist.scheduler().pool().len(), 2 );
    }


    #[test]
    fn test_move_tagged_after_and_before() {
        let mut playlist = playlist( &[ "a", "b", "c", "d" ] );
        playlist.tag( 0, true );
        playlist.tag( 1, true );

        assert_eq!( playlist.move_tagged( 3, true ), Some( 1 ) );
        assert_eq!( names( &playlist ), vec![ "c", "d", "a", "b" ] );

        assert_eq!( playlist.move_tagged( 0, false ), Some( 2 ) );
        assert_eq!( names( &playlist ), vec![ "a", "b", "c", "d" ] );
    }


    #[test]
    fn test_move_tagged_ignores_tagged_anchor() {
        let mut playlist = playlist( &[ "a", "b" ] );
        playlist.tag( 0, true );
        assert_eq!( playlist.move_tagged( 0, true ), None );
        assert_eq!( playlist.move_tagged( 1, true ), Some( 0 ) );
    }


    #[test]
    fn test_tag_operations() {
        let mut playlist = playlist( &[ "one.ogg", "two.mp3", "three.ogg" ] );
        let ogg = Regex::new( r"\.ogg$" ).unwrap();

        assert_eq!( playlist.tag_matching( &ogg, true ), 2 );
        assert_eq!( playlist.tagged_count(), 2 );

        playlist.invert_tags();
        assert_eq!( playlist.tagged_count(), 1 );
        assert!( playlist.get( 1 ).unwrap().tagged );

        playlist.toggle_tag( 1 );
        assert_eq!( playlist.tagged_count(), 0 );
    }


    #[test]
    fn test_sort_by_name() {
        let mut playlist = playlist( &[ "b", "C", "a" ] );
        playlist.sort();
        assert_eq!( names( &playlist ), vec![ "a", "b", "C" ] );
    }


    #[test]
    fn test_shuffle_keeps_entries() {
        let mut playlist = playlist( &[ "a", "b", "c", "d", "e" ] );
        playlist.shuffle();
        let mut sorted = names( &playlist );
        sorted.sort();
        assert_eq!( sorted, vec![ "a", "b", "c", "d", "e" ] );
    }


    #[test]
    fn test_set_active_is_exclusive() {
        let mut playlist = playlist( &[ "a", "b", "c" ] );
        playlist.set_active( 0 );
        playlist.set_active( 2 );

        assert_eq!( playlist.entries().iter().filter( |e| e.active ).count(), 1 );
        assert_eq!( playlist.jump_to_active(), Some( 2 ) );
        assert_eq!( playlist.active().map( |e| e.name.as_str() ), Some( "c" ) );
    }


    #[test]
    fn test_advance_sequential() {
        let mut playlist = playlist( &[ "a", "b" ] );
        assert_eq!( playlist.advance( Direction::Forward ).map( |e| e.name ), Some( "a".to_string() ) );
        assert_eq!( playlist.advance( Direction::Forward ).map( |e| e.name ), Some( "b".to_string() ) );
        assert!( playlist.advance( Direction::Forward ).is_none() );

        playlist.toggle_repeat();
        assert_eq!( playlist.advance( Direction::Forward ).map( |e| e.name ), Some( "a".to_string() ) );
    }


    #[test]
    fn test_toggle_flags() {
        let mut playlist = Playlist::new();
        assert!( playlist.toggle_repeat() );
        assert!( playlist.toggle_random() );
        assert!( playlist.toggle_stop() );
        assert!( !playlist.toggle_stop() );
        assert!( playlist.repeat() && playlist.random() );
    }


    #[test]
    fn test_clear_resets_everything() {
        let mut playlist = playlist( &[ "a", "b" ] );
        playlist.set_random( true );
        playlist.advance( Direction::Forward );
        playlist.clear();

        assert!( playlist.is_empty() );
        assert!( playlist.scheduler().history().is_empty() );
        assert!( playlist.scheduler().pool().is_empty() );
    }


    #[test]
    fn test_restore_keeps_single_active_and_continues_ids() {
        let mut entries: Vec<PlaylistEntry> = ( 1..=3 )
            .map( |i| PlaylistEntry::new( EntryId( i * 10 ), format!( "/{}.ogg", i ) ) )
            .collect();
        entries[ 0 ].active = true;
        entries[ 2 ].active = true;

        let mut playlist = Playlist::new();
        playlist.restore( entries, true, false );

        assert_eq!( playlist.jump_to_active(), Some( 0 ) );
        assert!( playlist.repeat() );
        assert_eq!( playlist.add( "/new.ogg" ), EntryId( 31 ) );
    }


    #[test]
    fn test_add_path_missing() {
        let mut playlist = Playlist::new();
        let registry = BackendRegistry::with_defaults().unwrap();
        let result = playlist.add_path( Path::new( "/definitely/not/here" ), &registry );
        assert!( matches!( result, Err( PlaylistError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_add_path_walks_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir( dir.path().join( "disc2" ) ).unwrap();
        std::fs::write( dir.path().join( "b.ogg" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "a.mp3" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "cover.jpg" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "disc2" ).join( "c.wav" ), b"" ).unwrap();

        let mut playlist = Playlist::new();
        let registry = BackendRegistry::with_defaults().unwrap();
        assert_eq!( playlist.add_path( dir.path(), &registry ).unwrap(), 3 );
        assert_eq!( names( &playlist ), vec![ "a.mp3", "b.ogg", "c.wav" ] );
    }


    #[test]
    fn test_add_location_url() {
        let mut playlist = Playlist::new();
        let registry = BackendRegistry::with_defaults().unwrap();
        assert_eq!( playlist.add_location( "http://radio.example:8000", &registry ).unwrap(), 1 );
        assert_eq!( playlist.get( 0 ).unwrap().location, "http://radio.example:8000/" );
    }
}
