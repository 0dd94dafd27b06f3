//! Resume file
//!
//! Snapshot of the playlist and playback position written on exit and read
//! back on the next start.

use std::fs;
use std::path::Path;

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::entry::{ EntryId, PlaylistEntry };


/// Errors that can occur reading or writing the resume file.
#[derive( Debug, Error )]
pub enum SessionError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid resume file: {0}" )]
    Format( #[from] serde_json::Error ),
}


/// Everything needed to pick up where the last session stopped.
#[derive( Debug, Clone, Default, PartialEq, Serialize, Deserialize )]
pub struct ResumeState {
    #[serde( default )]
    pub repeat: bool,

    #[serde( default )]
    pub random: bool,

    #[serde( default )]
    pub entries: Vec<PlaylistEntry>,

    /// Entry that was loaded in the player.
    #[serde( default )]
    pub entry: Option<EntryId>,

    #[serde( default )]
    pub offset: f64,

    #[serde( default )]
    pub length: f64,
}


impl ResumeState {
    /// Loads a resume file.
    ///
    /// @returns `None` if the file does not exist
    pub fn load( path: &Path ) -> Result<Option<Self>, SessionError> {
        let content = match fs::read_to_string( path ) {
            Ok( c ) => c,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => return Ok( None ),
            Err( e ) => return Err( e.into() ),
        };
        let state = serde_json::from_str( &content )?;
        tracing::info!( "Loaded resume file {:?}", path );
        Ok( Some( state ) )
    }


    /// Writes the resume file, replacing it atomically.
    pub fn save( &self, path: &Path ) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty( self )?;
        let tmp = path.with_extension( "tmp" );
        fs::write( &tmp, json )?;
        fs::rename( &tmp, path )?;
        tracing::info!( "Saved resume file {:?}", path );
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( ".tapedeck.rec" );

        let mut entry = PlaylistEntry::new( EntryId( 4 ), "/music/a.ogg" );
        entry.active = true;
        let state = ResumeState {
            repeat: true,
            random: false,
            entries: vec![ entry ],
            entry: Some( EntryId( 4 ) ),
            offset: 61.0,
            length: 245.0,
        };
        state.save( &path ).unwrap();

        assert_eq!( ResumeState::load( &path ).unwrap(), Some( state ) );
    }


    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!( ResumeState::load( &dir.path().join( "nope" ) ).unwrap(), None );
    }


    #[test]
    fn test_load_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "bad.rec" );
        std::fs::write( &path, "not json" ).unwrap();
        assert!( matches!( ResumeState::load( &path ), Err( SessionError::Format( _ ) ) ) );
    }


    #[test]
    fn test_missing_fields_default() {
        let state: ResumeState = serde_json::from_str( r#"{ "repeat": true }"# ).unwrap();
        assert!( state.repeat );
        assert!( state.entries.is_empty() );
        assert_eq!( state.entry, None );
    }
}
