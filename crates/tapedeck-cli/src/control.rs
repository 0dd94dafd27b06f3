//! Remote-control FIFO.
//!
//! A named pipe other processes write command lines into. The controller
//! owns the FIFO for its lifetime and removes it on drop.

use std::ffi::CString;
use std::fs::{ File, OpenOptions };
use std::io::{ self, Read };
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{ AsRawFd, RawFd };
use std::path::{ Path, PathBuf };

use anyhow::{ bail, Context, Result };

use tapedeck_core::{ CommandError, RemoteCommand };


/// The control channel of a running controller.
#[derive( Debug )]
pub struct ControlFifo {
    path: PathBuf,
    file: File,
    pending: Vec<u8>,
}


impl ControlFifo {
    /// Creates the FIFO with mode 0600 and opens it read-write, non-blocking.
    ///
    /// Fails if something already exists at `path`; another controller
    /// probably owns it.
    pub fn create( path: &Path ) -> Result<Self> {
        if path.exists() || path.symlink_metadata().is_ok() {
            bail!( "{} already exists", path.display() );
        }

        let c_path = CString::new( path.as_os_str().as_bytes() ).context( "FIFO path contains NUL" )?;
        // SAFETY: c_path is a valid NUL-terminated string.
        if unsafe { libc::mkfifo( c_path.as_ptr(), 0o600 ) } != 0 {
            return Err( io::Error::last_os_error() ).with_context( || format!( "mkfifo {}", path.display() ) );
        }

        // Read-write, so the FIFO never reports EOF between writers.
        let file = OpenOptions::new()
            .read( true )
            .write( true )
            .custom_flags( libc::O_NONBLOCK )
            .open( path );
        let file = match file {
            Ok( f ) => f,
            Err( e ) => {
                let _ = std::fs::remove_file( path );
                return Err( e ).with_context( || format!( "open {}", path.display() ) );
            }
        };

        tracing::info!( "Control FIFO at {:?}", path );
        Ok( Self { path: path.to_path_buf(), file, pending: Vec::new() } )
    }


    pub fn fd( &self ) -> RawFd {
        self.file.as_raw_fd()
    }


    /// Reads what is available and parses every complete line.
    pub fn read_commands( &mut self ) -> Vec<Result<RemoteCommand, CommandError>> {
        let mut chunk = [ 0u8; 1024 ];
        loop {
            match self.file.read( &mut chunk ) {
                Ok( 0 ) => break,
                Ok( n ) => self.pending.extend_from_slice( &chunk[ ..n ] ),
                Err( e ) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err( e ) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err( e ) => {
                    tracing::warn!( "Reading control FIFO failed: {}", e );
                    break;
                }
            }
        }
        drain_lines( &mut self.pending )
    }
}


impl Drop for ControlFifo {
    fn drop( &mut self ) {
        if let Err( e ) = std::fs::remove_file( &self.path ) {
            tracing::warn!( "Failed to remove {:?}: {}", self.path, e );
        }
    }
}


// Parses complete lines out of `buffer`, leaving a trailing partial line.
fn drain_lines( buffer: &mut Vec<u8> ) -> Vec<Result<RemoteCommand, CommandError>> {
    let Some( end ) = buffer.iter().rposition( |b| *b == b'\n' ) else {
        return Vec::new();
    };
    let complete: Vec<u8> = buffer.drain( ..=end ).collect();
    String::from_utf8_lossy( &complete )
        .lines()
        .filter( |line| !line.trim().is_empty() )
        .map( RemoteCommand::parse )
        .collect()
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::io::Write;


    #[test]
    fn test_drain_keeps_partial_line() {
        let mut buffer = b"next\npause\nvol".to_vec();
        let commands = drain_lines( &mut buffer );
        assert_eq!( commands, vec![ Ok( RemoteCommand::Next ), Ok( RemoteCommand::Pause ) ] );
        assert_eq!( buffer, b"vol" );

        buffer.extend_from_slice( b"ume set 40\n\nbogus\n" );
        let commands = drain_lines( &mut buffer );
        assert_eq!( commands.len(), 2 );
        assert!( commands[ 0 ].is_ok() );
        assert!( commands[ 1 ].is_err() );
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_fifo_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "control" );

        let mut fifo = ControlFifo::create( &path ).unwrap();
        assert!( fifo.read_commands().is_empty() );

        let mut writer = OpenOptions::new().write( true ).open( &path ).unwrap();
        writer.write_all( b"add /tmp/a b.ogg\nquit\n" ).unwrap();

        let commands = fifo.read_commands();
        assert_eq!( commands, vec![
            Ok( RemoteCommand::Add { location: "/tmp/a b.ogg".into() } ),
            Ok( RemoteCommand::Quit ),
        ] );

        drop( fifo );
        assert!( !path.exists() );
    }


    #[test]
    fn test_existing_path_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "control" );
        std::fs::write( &path, b"" ).unwrap();

        assert!( ControlFifo::create( &path ).is_err() );
        assert!( path.exists() );
    }
}
