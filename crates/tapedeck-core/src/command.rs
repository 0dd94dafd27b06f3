//! Remote-control command parsing.
//!
//! A running controller reads one command per line from its control
//! channel. Each command maps directly onto a coordinator or playlist
//! entry point.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::mixer::VolumeAction;


/// Errors that can occur during command parsing.
#[derive( Debug, Error, PartialEq )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed remote-control command.
#[derive( Debug, Clone, PartialEq )]
pub enum RemoteCommand {
    Pause,
    Next,
    Prev,
    Forward,
    Backward,
    Play,
    Stop,
    Volume { action: VolumeAction, value: i32 },
    Add { location: String },
    Jump { seconds: f64 },
    Empty,
    Quit,
}


impl RemoteCommand {
    /// Parses one control line.
    ///
    /// @param input - The line, without trailing newline
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "pause" => Ok( RemoteCommand::Pause ),
            "next" => Ok( RemoteCommand::Next ),
            "prev" => Ok( RemoteCommand::Prev ),
            "forward" => Ok( RemoteCommand::Forward ),
            "backward" => Ok( RemoteCommand::Backward ),
            "play" => Ok( RemoteCommand::Play ),
            "stop" => Ok( RemoteCommand::Stop ),
            "volume" => {
                let args = args
                    .ok_or_else( || CommandError::MissingArgument( "volume action".into() ) )?;
                let mut words = args.split_whitespace();
                let action = words
                    .next()
                    .unwrap_or( "" )
                    .parse::<VolumeAction>()
                    .map_err( CommandError::InvalidArgument )?;
                let value = words
                    .next()
                    .ok_or_else( || CommandError::MissingArgument( "volume value".into() ) )?;
                let value = value
                    .parse()
                    .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", value ) ) )?;
                Ok( RemoteCommand::Volume { action, value } )
            }
            "add" => {
                let location = args
                    .ok_or_else( || CommandError::MissingArgument( "path".into() ) )?;
                Ok( RemoteCommand::Add { location: location.to_string() } )
            }
            "jump" => {
                let time = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                Ok( RemoteCommand::Jump { seconds: parse_time( time )? } )
            }
            "empty" => Ok( RemoteCommand::Empty ),
            "quit" => Ok( RemoteCommand::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            RemoteCommand::Pause => "Toggle pause",
            RemoteCommand::Next => "Next track",
            RemoteCommand::Prev => "Previous track",
            RemoteCommand::Forward => "Seek forward",
            RemoteCommand::Backward => "Seek backward",
            RemoteCommand::Play | RemoteCommand::Stop => "Toggle stop",
            RemoteCommand::Volume { .. } => "Set or change volume",
            RemoteCommand::Add { .. } => "Add file, directory or URL",
            RemoteCommand::Jump { .. } => "Jump to position",
            RemoteCommand::Empty => "Clear playlist",
            RemoteCommand::Quit => "Quit",
        }
    }
}


impl fmt::Display for RemoteCommand {
    /// Formats the command as a control line that [`RemoteCommand::parse`] accepts.
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            RemoteCommand::Pause => f.write_str( "pause" ),
            RemoteCommand::Next => f.write_str( "next" ),
            RemoteCommand::Prev => f.write_str( "prev" ),
            RemoteCommand::Forward => f.write_str( "forward" ),
            RemoteCommand::Backward => f.write_str( "backward" ),
            RemoteCommand::Play => f.write_str( "play" ),
            RemoteCommand::Stop => f.write_str( "stop" ),
            RemoteCommand::Volume { action, value } => {
                let action = match action {
                    VolumeAction::Set => "set",
                    VolumeAction::Cue => "cue",
                };
                write!( f, "volume {} {}", action, value )
            }
            RemoteCommand::Add { location } => write!( f, "add {}", location ),
            RemoteCommand::Jump { seconds } => write!( f, "jump {}", seconds ),
            RemoteCommand::Empty => f.write_str( "empty" ),
            RemoteCommand::Quit => f.write_str( "quit" ),
        }
    }
}


/// Parses "M:SS", "H:MM:SS" or plain seconds; a leading `-` counts from the end.
///
/// @param s - Time string
///
/// @returns Seconds, negative when counting back from the end
fn parse_time( s: &str ) -> Result<f64, CommandError> {
    let s = s.trim();
    let ( sign, body ) = match s.strip_prefix( '-' ) {
        Some( rest ) => ( -1.0, rest ),
        None => ( 1.0, s ),
    };

    let mut seconds = 0.0;
    for field in body.split( ':' ) {
        let value: f64 = field
            .parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        if value < 0.0 {
            return Err( CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) );
        }
        seconds = seconds * 60.0 + value;
    }
    Ok( sign * seconds )
}


/// Default control FIFO location: `$TMPDIR/tapedeck-control-$USER`.
pub fn default_control_path() -> PathBuf {
    let user = std::env::var( "USER" )
        .or_else( |_| std::env::var( "LOGNAME" ) )
        .unwrap_or_else( |_| "user".into() );
    std::env::temp_dir().join( format!( "tapedeck-control-{}", user ) )
}


/// Returns help text listing the control protocol.
pub fn help_text() -> &'static str {
    r#"Control commands (one per line):
  pause                 Toggle pause
  next | prev           Next / previous track
  forward | backward    Seek
  play | stop           Toggle stop
  volume set <n>        Set volume (0-100)
  volume cue <n>        Change volume by n
  add <path|url>        Add to playlist
  jump <time>           Jump to position (e.g. 1:30, -0:10)
  empty                 Clear playlist
  quit                  Exit tapedeck"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_simple_commands() {
        assert_eq!( RemoteCommand::parse( "pause" ), Ok( RemoteCommand::Pause ) );
        assert_eq!( RemoteCommand::parse( "  NEXT \n" ), Ok( RemoteCommand::Next ) );
        assert_eq!( RemoteCommand::parse( "backward" ), Ok( RemoteCommand::Backward ) );
        assert_eq!( RemoteCommand::parse( "empty" ), Ok( RemoteCommand::Empty ) );
    }


    #[test]
    fn test_parse_add_keeps_spaces() {
        let cmd = RemoteCommand::parse( "add /music/My Album/01 intro.ogg" ).unwrap();
        assert_eq!( cmd, RemoteCommand::Add { location: "/music/My Album/01 intro.ogg".into() } );
    }


    #[test]
    fn test_parse_volume() {
        let cmd = RemoteCommand::parse( "volume cue -5" ).unwrap();
        assert_eq!( cmd, RemoteCommand::Volume { action: VolumeAction::Cue, value: -5 } );
    }


    #[test]
    fn test_parse_volume_errors() {
        assert!( matches!( RemoteCommand::parse( "volume" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( RemoteCommand::parse( "volume set" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( RemoteCommand::parse( "volume up 5" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( RemoteCommand::parse( "volume set x" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_jump() {
        assert_eq!( RemoteCommand::parse( "jump 1:30" ), Ok( RemoteCommand::Jump { seconds: 90.0 } ) );
        assert_eq!( RemoteCommand::parse( "jump -10" ), Ok( RemoteCommand::Jump { seconds: -10.0 } ) );
        assert_eq!( RemoteCommand::parse( "jump 1:00:05" ), Ok( RemoteCommand::Jump { seconds: 3605.0 } ) );
        assert!( RemoteCommand::parse( "jump soon" ).is_err() );
    }


    #[test]
    fn test_parse_unknown() {
        assert!( matches!( RemoteCommand::parse( "foobar" ), Err( CommandError::Unknown( _ ) ) ) );
        assert!( matches!( RemoteCommand::parse( "" ), Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( RemoteCommand::parse( "add" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_display_is_parsable() {
        let commands = [
            RemoteCommand::Volume { action: VolumeAction::Set, value: 40 },
            RemoteCommand::Add { location: "/tmp/a b.ogg".into() },
            RemoteCommand::Quit,
        ];
        for cmd in commands {
            assert_eq!( RemoteCommand::parse( &cmd.to_string() ), Ok( cmd.clone() ) );
        }
    }
}
