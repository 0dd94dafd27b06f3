//! File list for directory navigation.
//!
//! Lists one directory at a time, directories first, and marks the files
//! some backend can play. Tagged or selected entries are handed to the
//! playlist.

use std::fs;
use std::path::{ Path, PathBuf };

use anyhow::Result;

use tapedeck_core::BackendRegistry;


/// A file or directory entry in the list.
#[derive( Debug, Clone )]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub playable: bool,
    pub tagged: bool,
}


/// What opening the selected entry did.
#[derive( Debug, PartialEq )]
pub enum Opened {
    Nothing,
    Directory,
    File( PathBuf ),
}


/// File list state.
#[derive( Debug )]
pub struct FileList {
    current_dir: PathBuf,
    entries: Vec<FileEntry>,
    visible: Vec<usize>,
    selected: usize,
    filter: String,
}


impl FileList {
    /// Creates a file list showing `path`.
    pub fn new( path: PathBuf, registry: &BackendRegistry ) -> Result<Self> {
        let mut list = Self {
            current_dir: path,
            entries: Vec::new(),
            visible: Vec::new(),
            selected: 0,
            filter: String::new(),
        };
        list.refresh( registry )?;
        Ok( list )
    }


    /// Re-reads the current directory.
    pub fn refresh( &mut self, registry: &BackendRegistry ) -> Result<()> {
        self.entries.clear();
        self.selected = 0;

        if let Some( parent ) = self.current_dir.parent() {
            self.entries.push( FileEntry {
                path: parent.to_path_buf(),
                name: "..".to_string(),
                is_dir: true,
                playable: false,
                tagged: false,
            });
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir( &self.current_dir )?.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with( '.' ) {
                continue;
            }

            let is_dir = path.is_dir();
            let playable = !is_dir && registry.can_play( &path.to_string_lossy() );
            let file = FileEntry { path, name, is_dir, playable, tagged: false };
            if is_dir {
                dirs.push( file );
            } else {
                files.push( file );
            }
        }

        dirs.sort_by( |a, b| a.name.to_lowercase().cmp( &b.name.to_lowercase() ) );
        files.sort_by( |a, b| a.name.to_lowercase().cmp( &b.name.to_lowercase() ) );
        self.entries.extend( dirs );
        self.entries.extend( files );

        self.apply_filter();
        Ok(())
    }


    /// Shows another directory; the filter is reset.
    pub fn navigate_to( &mut self, path: &Path, registry: &BackendRegistry ) -> Result<()> {
        let target = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join( path )
        };

        if target.is_dir() {
            let previous = std::mem::replace( &mut self.current_dir, target );
            self.filter.clear();
            if let Err( e ) = self.refresh( registry ) {
                self.current_dir = previous;
                self.refresh( registry )?;
                return Err( e );
            }
        }
        Ok(())
    }


    /// Enters the selected directory or returns the selected file.
    pub fn open_selected( &mut self, registry: &BackendRegistry ) -> Result<Opened> {
        let Some( entry ) = self.selected_entry().cloned() else {
            return Ok( Opened::Nothing );
        };
        if entry.is_dir {
            self.navigate_to( &entry.path, registry )?;
            Ok( Opened::Directory )
        } else {
            Ok( Opened::File( entry.path ) )
        }
    }


    /// Goes to the parent directory and selects the one we came from.
    pub fn go_up( &mut self, registry: &BackendRegistry ) -> Result<()> {
        let Some( parent ) = self.current_dir.parent().map( Path::to_path_buf ) else {
            return Ok(());
        };
        let came_from = self.current_dir.clone();
        self.navigate_to( &parent, registry )?;
        if let Some( pos ) = self.visible.iter().position( |&i| self.entries[ i ].path == came_from ) {
            self.selected = pos;
        }
        Ok(())
    }


    pub fn set_filter( &mut self, filter: String ) {
        self.filter = filter;
        self.apply_filter();
    }


    pub fn filter( &self ) -> &str {
        &self.filter
    }


    fn apply_filter( &mut self ) {
        let needle = self.filter.to_lowercase();
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter( |( _, e )| e.name == ".." || needle.is_empty() || e.name.to_lowercase().contains( &needle ) )
            .map( |( i, _ )| i )
            .collect();

        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub( 1 );
        }
    }


    /// Moves the cursor by `delta` rows, stopping at either end.
    pub fn move_cursor( &mut self, delta: isize ) {
        let last = self.visible.len().saturating_sub( 1 ) as isize;
        self.selected = ( self.selected as isize + delta ).clamp( 0, last ) as usize;
    }


    pub fn select_first( &mut self ) {
        self.selected = 0;
    }


    pub fn select_last( &mut self ) {
        self.selected = self.visible.len().saturating_sub( 1 );
    }


    /// Flips the tag of the selected entry and moves down.
    pub fn toggle_tag( &mut self ) {
        if let Some( &index ) = self.visible.get( self.selected ) {
            let entry = &mut self.entries[ index ];
            if entry.name != ".." {
                entry.tagged = !entry.tagged;
            }
            self.move_cursor( 1 );
        }
    }


    /// Paths to add: every tagged entry, or the selected one if none is tagged.
    pub fn selection( &self ) -> Vec<PathBuf> {
        let tagged: Vec<PathBuf> = self
            .entries
            .iter()
            .filter( |e| e.tagged )
            .map( |e| e.path.clone() )
            .collect();
        if !tagged.is_empty() {
            return tagged;
        }
        self.selected_entry()
            .filter( |e| e.name != ".." )
            .map( |e| vec![ e.path.clone() ] )
            .unwrap_or_default()
    }


    pub fn clear_tags( &mut self ) {
        for entry in &mut self.entries {
            entry.tagged = false;
        }
    }


    pub fn selected_entry( &self ) -> Option<&FileEntry> {
        self.visible.get( self.selected ).and_then( |&i| self.entries.get( i ) )
    }


    /// Entries passing the filter.
    pub fn visible_entries( &self ) -> Vec<&FileEntry> {
        self.visible.iter().filter_map( |&i| self.entries.get( i ) ).collect()
    }


    pub fn selected_index( &self ) -> usize {
        self.selected
    }


    pub fn current_dir( &self ) -> &Path {
        &self.current_dir
    }


    pub fn len( &self ) -> usize {
        self.visible.len()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir( dir.path().join( "Sub" ) ).unwrap();
        fs::write( dir.path().join( "b.ogg" ), b"" ).unwrap();
        fs::write( dir.path().join( "a.txt" ), b"" ).unwrap();
        fs::write( dir.path().join( ".hidden.ogg" ), b"" ).unwrap();
        fs::write( dir.path().join( "Sub" ).join( "c.ogg" ), b"" ).unwrap();
        dir
    }


    fn names( list: &FileList ) -> Vec<String> {
        list.visible_entries().iter().map( |e| e.name.clone() ).collect()
    }


    #[test]
    fn test_listing_order_and_playable() {
        let dir = fixture();
        let registry = BackendRegistry::with_defaults().unwrap();
        let list = FileList::new( dir.path().to_path_buf(), &registry ).unwrap();

        assert_eq!( names( &list ), vec![ "..", "Sub", "a.txt", "b.ogg" ] );
        let playable: Vec<bool> = list.visible_entries().iter().map( |e| e.playable ).collect();
        assert_eq!( playable, vec![ false, false, false, true ] );
    }


    #[test]
    fn test_open_and_go_up() {
        let dir = fixture();
        let registry = BackendRegistry::with_defaults().unwrap();
        let mut list = FileList::new( dir.path().to_path_buf(), &registry ).unwrap();

        list.move_cursor( 1 );
        assert_eq!( list.open_selected( &registry ).unwrap(), Opened::Directory );
        assert_eq!( names( &list ), vec![ "..", "c.ogg" ] );

        list.move_cursor( 1 );
        let expected = dir.path().join( "Sub" ).join( "c.ogg" );
        assert_eq!( list.open_selected( &registry ).unwrap(), Opened::File( expected ) );

        list.go_up( &registry ).unwrap();
        assert_eq!( list.current_dir(), dir.path() );
        assert_eq!( list.selected_entry().map( |e| e.name.as_str() ), Some( "Sub" ) );
    }


    #[test]
    fn test_filter_keeps_parent() {
        let dir = fixture();
        let registry = BackendRegistry::with_defaults().unwrap();
        let mut list = FileList::new( dir.path().to_path_buf(), &registry ).unwrap();

        list.select_last();
        list.set_filter( "OGG".into() );
        assert_eq!( names( &list ), vec![ "..", "b.ogg" ] );
        assert_eq!( list.selected_index(), 1 );
    }


    #[test]
    fn test_selection_prefers_tags() {
        let dir = fixture();
        let registry = BackendRegistry::with_defaults().unwrap();
        let mut list = FileList::new( dir.path().to_path_buf(), &registry ).unwrap();

        assert!( list.selection().is_empty() );

        list.select_last();
        assert_eq!( list.selection(), vec![ dir.path().join( "b.ogg" ) ] );

        list.select_first();
        list.toggle_tag();
        list.toggle_tag();
        assert_eq!( list.selection(), vec![ dir.path().join( "Sub" ) ] );

        list.clear_tags();
        assert_eq!( list.selection(), vec![ dir.path().join( "a.txt" ) ] );
    }
}
