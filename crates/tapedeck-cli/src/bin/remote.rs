//! Sends control commands to a running tapedeck.

use std::fs::OpenOptions;
use std::io::{ self, Write };
use std::os::unix::fs::OpenOptionsExt;
use std::path::{ Path, PathBuf };

use anyhow::{ bail, Context, Result };
use clap::Parser;

use tapedeck_core::command::{ default_control_path, help_text };
use tapedeck_core::RemoteCommand;


#[derive( Parser, Debug )]
#[command( name = "tapedeck-remote", version, about = "Control a running tapedeck", after_help = help_text() )]
struct Args {
    /// Control FIFO of the running tapedeck
    #[arg( long )]
    fifo: Option<PathBuf>,

    /// Command and its arguments, e.g. `volume cue -5`
    #[arg( required = true, num_args = 1.., allow_hyphen_values = true )]
    command: Vec<String>,
}


/// Builds the control line, making `add` locations absolute.
fn control_line( words: &[ String ] ) -> Result<RemoteCommand> {
    let mut command = RemoteCommand::parse( &words.join( " " ) )?;
    if let RemoteCommand::Add { location } = &mut command {
        if !location.contains( "://" ) && Path::new( location.as_str() ).is_relative() {
            let absolute = std::env::current_dir()
                .context( "Cannot resolve current directory" )?
                .join( location.as_str() );
            *location = absolute.to_string_lossy().into_owned();
        }
    }
    Ok( command )
}


fn main() -> Result<()> {
    let args = Args::parse();
    let command = control_line( &args.command )?;
    let path = args.fifo.unwrap_or_else( default_control_path );

    // Non-blocking open fails with ENXIO when nobody is reading.
    let mut fifo = match OpenOptions::new().write( true ).custom_flags( libc::O_NONBLOCK ).open( &path ) {
        Ok( f ) => f,
        Err( e ) if e.raw_os_error() == Some( libc::ENXIO ) || e.kind() == io::ErrorKind::NotFound => {
            bail!( "No tapedeck is listening on {}", path.display() );
        }
        Err( e ) => return Err( e ).with_context( || format!( "Cannot open {}", path.display() ) ),
    };
    fifo.write_all( format!( "{}\n", command ).as_bytes() )
        .with_context( || format!( "Cannot write to {}", path.display() ) )?;
    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;


    fn words( line: &str ) -> Vec<String> {
        line.split_whitespace().map( String::from ).collect()
    }


    #[test]
    fn test_add_is_made_absolute() {
        let command = control_line( &words( "add music/a.ogg" ) ).unwrap();
        let RemoteCommand::Add { location } = command else {
            panic!( "expected add" );
        };
        assert!( Path::new( &location ).is_absolute() );
        assert!( location.ends_with( "music/a.ogg" ) );

        let command = control_line( &words( "add http://host/stream" ) ).unwrap();
        assert_eq!( command, RemoteCommand::Add { location: "http://host/stream".into() } );
    }


    #[test]
    fn test_invalid_command_is_rejected() {
        assert!( control_line( &words( "rewind" ) ).is_err() );
        assert!( control_line( &words( "volume cue -5" ) ).is_ok() );
    }
}
