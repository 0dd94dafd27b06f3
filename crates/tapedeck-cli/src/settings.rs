//! Application settings management
//!
//! Persistent tuning knobs and the optional user-defined backend list.

use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };

use tapedeck_core::{ BackendSpec, PlayerConfig };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Control FIFO path override
    pub fifo: Option<PathBuf>,

    /// Quiet period before a seek restarts the player
    pub seek_debounce_ms: u64,

    /// Loop wake-up interval while playing
    pub poll_interval_ms: u64,

    /// Skip a playing track that produced no output for this long
    pub watchdog_secs: Option<u64>,

    /// Exit once the playlist has been played through
    pub quit_after_playlist: bool,

    /// Replaces the built-in player list when set
    pub backends: Option<Vec<BackendSpec>>,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            fifo: None,
            seek_debounce_ms: 500,
            poll_interval_ms: 500,
            watchdog_secs: None,
            quit_after_playlist: false,
            backends: None,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "tapedeck" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from `path`; any failure yields the defaults.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => serde_json::from_str( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Ignoring invalid settings {:?}: {}", path, e );
                Self::default()
            }),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    pub fn save_to( &self, path: &Path ) {
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    /// Coordinator timing derived from these settings.
    pub fn player_config( &self ) -> PlayerConfig {
        PlayerConfig {
            seek_debounce: Duration::from_millis( self.seek_debounce_ms ),
            poll_interval: Duration::from_millis( self.poll_interval_ms.max( 10 ) ),
            watchdog: self.watchdog_secs.map( Duration::from_secs ),
            ..PlayerConfig::default()
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use tapedeck_core::ProgressFormat;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!( Settings::load_from( &dir.path().join( "settings.json" ) ), Settings::default() );
    }


    #[test]
    fn test_round_trip_with_backends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "tapedeck" ).join( "settings.json" );
        let settings = Settings {
            watchdog_secs: Some( 30 ),
            backends: Some( vec![ BackendSpec::new( "mpv --start={offset} {file}", r"\.flac$", 1.0, ProgressFormat::WallClock ) ] ),
            ..Settings::default()
        };
        settings.save_to( &path );

        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "seek_debounce_ms": 250 }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert_eq!( settings.seek_debounce_ms, 250 );
        assert_eq!( settings.poll_interval_ms, 500 );
        assert_eq!( settings.player_config().seek_debounce, Duration::from_millis( 250 ) );
        assert_eq!( settings.player_config().watchdog, None );
    }


    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "{ nope" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }
}
