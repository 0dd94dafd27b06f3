//! Volume control seam.
//!
//! The controller never talks to audio hardware itself; a [`Mixer`]
//! implementation supplied by the host does.

use std::str::FromStr;

use thiserror::Error;


/// Errors reported by mixer implementations.
#[derive( Debug, Error )]
pub enum MixerError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Unexpected mixer output: {0}" )]
    Parse( String ),

    #[error( "Not supported by this mixer" )]
    Unsupported,
}


/// How a volume value is applied.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum VolumeAction {
    /// Absolute level in percent.
    Set,

    /// Relative change in percent.
    Cue,
}


impl FromStr for VolumeAction {
    type Err = String;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "set" => Ok( VolumeAction::Set ),
            "cue" => Ok( VolumeAction::Cue ),
            other => Err( format!( "Invalid volume action: '{}'. Use 'set' or 'cue'", other ) ),
        }
    }
}


/// A volume control.
pub trait Mixer {
    /// Short name shown in status messages.
    fn name( &self ) -> &str;


    /// Current level in percent.
    fn volume( &mut self ) -> Result<u8, MixerError>;


    fn set_volume( &mut self, level: u8 ) -> Result<(), MixerError>;


    /// Changes the level by `delta` percent, clamped to 0..=100.
    fn cue( &mut self, delta: i32 ) -> Result<u8, MixerError> {
        let level = ( self.volume()? as i32 + delta ).clamp( 0, 100 ) as u8;
        self.set_volume( level )?;
        Ok( level )
    }


    /// Switches to the next controlled channel, if the mixer has several.
    fn toggle( &mut self ) -> Result<(), MixerError> {
        Err( MixerError::Unsupported )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    struct Fixed( u8 );


    impl Mixer for Fixed {
        fn name( &self ) -> &str {
            "fixed"
        }


        fn volume( &mut self ) -> Result<u8, MixerError> {
            Ok( self.0 )
        }


        fn set_volume( &mut self, level: u8 ) -> Result<(), MixerError> {
            self.0 = level;
            Ok(())
        }
    }


    #[test]
    fn test_cue_clamps() {
        let mut mixer = Fixed( 95 );
        assert_eq!( mixer.cue( 10 ).unwrap(), 100 );
        assert_eq!( mixer.cue( -150 ).unwrap(), 0 );
        assert!( matches!( mixer.toggle(), Err( MixerError::Unsupported ) ) );
    }


    #[test]
    fn test_parse_volume_action() {
        assert_eq!( "SET".parse::<VolumeAction>(), Ok( VolumeAction::Set ) );
        assert_eq!( "cue".parse::<VolumeAction>(), Ok( VolumeAction::Cue ) );
        assert!( "louder".parse::<VolumeAction>().is_err() );
    }
}
