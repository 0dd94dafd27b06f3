//! Readiness multiplexing for the single-threaded main loop.
//!
//! The host loop blocks in exactly one place, [`wait_readable`], on the
//! union of keyboard, player output and control-channel descriptors.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;


/// How long the loop may block.
///
/// The earliest timeout deadline bounds the wait; while a player is
/// running the wait is further capped at `poll_interval` so its exit and
/// progress are noticed. `None` means block until a descriptor is ready.
pub fn wait_timeout( timer_due: Option<Duration>, playing: bool, poll_interval: Duration ) -> Option<Duration> {
    let poll = playing.then_some( poll_interval );
    match ( timer_due, poll ) {
        ( Some( a ), Some( b ) ) => Some( a.min( b ) ),
        ( a, b ) => a.or( b ),
    }
}


/// Waits until at least one descriptor is readable or the timeout passes.
///
/// Hang-ups and errors count as readable so the caller gets to observe
/// end of file. An interrupted wait returns no descriptors.
///
/// @param fds - Descriptors to watch
/// @param timeout - Upper bound on the wait; `None` blocks indefinitely
///
/// @returns The ready descriptors, in the order given
pub fn wait_readable( fds: &[ RawFd ], timeout: Option<Duration> ) -> io::Result<Vec<RawFd>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map( |&fd| libc::pollfd { fd, events: libc::POLLIN, revents: 0 } )
        .collect();

    let timeout_ms = match timeout {
        Some( d ) => d.as_micros().div_ceil( 1000 ).min( i32::MAX as u128 ) as libc::c_int,
        None => -1,
    };

    // SAFETY: pollfds is a valid, exclusively borrowed array of nfds entries.
    let rc = unsafe { libc::poll( pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms ) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok( Vec::new() );
        }
        return Err( err );
    }

    Ok( pollfds
        .iter()
        .filter( |p| p.revents & ( libc::POLLIN | libc::POLLHUP | libc::POLLERR ) != 0 )
        .map( |p| p.fd )
        .collect() )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;


    #[test]
    fn test_wait_timeout_takes_soonest() {
        let half = Duration::from_millis( 500 );
        assert_eq!( wait_timeout( None, false, half ), None );
        assert_eq!( wait_timeout( None, true, half ), Some( half ) );
        assert_eq!( wait_timeout( Some( Duration::from_secs( 3 ) ), false, half ), Some( Duration::from_secs( 3 ) ) );
        assert_eq!( wait_timeout( Some( Duration::from_secs( 3 ) ), true, half ), Some( half ) );
        assert_eq!( wait_timeout( Some( Duration::ZERO ), true, half ), Some( Duration::ZERO ) );
    }


    #[test]
    fn test_wait_readable_reports_ready_fd() {
        let ( mut a, b ) = UnixStream::pair().unwrap();
        let ( _c, d ) = UnixStream::pair().unwrap();
        a.write_all( b"x" ).unwrap();

        let ready = wait_readable( &[ d.as_raw_fd(), b.as_raw_fd() ], Some( Duration::from_secs( 1 ) ) ).unwrap();
        assert_eq!( ready, vec![ b.as_raw_fd() ] );
    }


    #[test]
    fn test_wait_readable_times_out() {
        let ( _a, b ) = UnixStream::pair().unwrap();
        let start = Instant::now();
        let ready = wait_readable( &[ b.as_raw_fd() ], Some( Duration::from_millis( 30 ) ) ).unwrap();

        assert!( ready.is_empty() );
        assert!( start.elapsed() >= Duration::from_millis( 25 ) );
    }


    #[test]
    fn test_hangup_counts_as_ready() {
        let ( a, b ) = UnixStream::pair().unwrap();
        drop( a );
        let ready = wait_readable( &[ b.as_raw_fd() ], Some( Duration::from_secs( 1 ) ) ).unwrap();
        assert_eq!( ready, vec![ b.as_raw_fd() ] );
    }
}
