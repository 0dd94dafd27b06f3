//! Termination signals.
//!
//! SIGINT, SIGTERM and SIGHUP only raise a flag; the main loop notices it
//! after its readiness wait is interrupted and shuts down normally.

use std::sync::atomic::{ AtomicBool, Ordering };


static QUIT: AtomicBool = AtomicBool::new( false );


extern "C" fn request_quit( _signal: libc::c_int ) {
    QUIT.store( true, Ordering::SeqCst );
}


/// Installs the quit handlers.
pub fn install() {
    for signal in [ libc::SIGINT, libc::SIGTERM, libc::SIGHUP ] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = unsafe { libc::signal( signal, request_quit as libc::sighandler_t ) };
        if previous == libc::SIG_ERR {
            tracing::warn!( "Could not install handler for signal {}", signal );
        }
    }
}


/// True once a termination signal arrived.
pub fn quit_requested() -> bool {
    QUIT.load( Ordering::SeqCst )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_signal_sets_flag() {
        install();
        assert!( !quit_requested() );
        // SAFETY: raising a signal whose handler was just installed.
        unsafe { libc::raise( libc::SIGHUP ) };
        assert!( quit_requested() );
    }
}
