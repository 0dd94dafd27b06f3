//! External player backends
//!
//! A [`Backend`] wraps one external player program. It builds the command
//! line for an entry, owns the child process, suspends and resumes it with
//! signals, and turns the child's progress output into a [`Position`].
//!
//! Seeking is done by restarting: [`Backend::seek`] only moves the desired
//! offset, and the next [`Backend::spawn`] starts the player there.

mod progress;
mod registry;

pub use progress::{ Position, ProgressContext, ProgressFormat, ProgressParser };
pub use registry::{ BackendRegistry, RE_VIDEO };

use std::fmt;
use std::io::{ self, Read, Write };
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::{ AsRawFd, RawFd };
use std::path::{ Path, PathBuf };
use std::process::{ Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio };
use std::time::{ Duration, Instant };

use regex::{ Regex, RegexBuilder };
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::entry::PlaylistEntry;


/// Fraction of the track length covered by one relative seek step.
const SEEK_FRACTION: f64 = 0.002;

/// Seek step in seconds when the track length is not known yet.
const UNKNOWN_LENGTH_SEEK: f64 = 1.0;

/// Bytes read from a child pipe per readiness event.
const READ_CHUNK: usize = 512;

/// Upper bound on buffered, not yet parsed output.
const MAX_BUFFER: usize = 4096;

/// How long a terminated child gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_millis( 250 );

const DEFAULT_PATH: &str = "/usr/bin:/bin";


/// Errors that can occur while driving a player process.
#[derive( Debug, Error )]
pub enum BackendError {
    #[error( "Failed to start player: {0}" )]
    Spawn( #[source] io::Error ),

    #[error( "Player not installed: {0}" )]
    NotInstalled( String ),

    #[error( "Empty command line" )]
    EmptyCommand,

    #[error( "Nothing to play" )]
    NoEntry,

    #[error( "Invalid pattern: {0}" )]
    Pattern( #[from] regex::Error ),

    #[error( "Signal failed: {0}" )]
    Signal( #[source] io::Error ),

    #[error( "Speed control requires a controllable player" )]
    NoControlChannel,

    #[error( "Control channel write failed: {0}" )]
    Control( #[source] io::Error ),
}


/// How commands can be injected into a running player.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "kebab-case" )]
pub enum ControlChannel {
    /// Stdin is closed; the player is only driven by signals.
    #[default]
    None,

    /// Line commands (`seek`, `speed_set`) are written to the player's stdin.
    Stdin,
}


fn default_fps() -> f64 {
    1.0
}


/// Static description of a player program.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct BackendSpec {
    /// Command template with `{file}` and `{offset}` placeholders.
    pub command: String,

    /// Case-insensitive pattern over the entry location.
    pub pattern: String,

    /// Units of `{offset}` per second.
    #[serde( default = "default_fps" )]
    pub fps: f64,

    pub progress: ProgressFormat,

    #[serde( default )]
    pub control: ControlChannel,
}


impl BackendSpec {
    pub fn new( command: &str, pattern: &str, fps: f64, progress: ProgressFormat ) -> Self {
        Self {
            command: command.to_string(),
            pattern: pattern.to_string(),
            fps,
            progress,
            control: ControlChannel::None,
        }
    }


    pub fn with_control( mut self, control: ControlChannel ) -> Self {
        self.control = control;
        self
    }
}


/// Playback state derived from a backend's observables.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlaybackState {
    Uninitialized,
    Stopped,
    Finished,
    Paused,
    Playing,
}


impl PlaybackState {
    /// Derives the state from primitive observables.
    ///
    /// @param has_entry - An entry has been set up
    /// @param child_exists - A child process handle is held
    /// @param child_exited - The held child has exited
    /// @param paused - The child was suspended
    pub fn derive( has_entry: bool, child_exists: bool, child_exited: bool, paused: bool ) -> Self {
        match ( has_entry, child_exists, child_exited, paused ) {
            ( false, _, _, _ ) => PlaybackState::Uninitialized,
            ( true, false, _, _ ) => PlaybackState::Stopped,
            ( true, true, true, _ ) => PlaybackState::Finished,
            ( true, true, false, true ) => PlaybackState::Paused,
            ( true, true, false, false ) => PlaybackState::Playing,
        }
    }


    /// Playing or paused: a live child holds the current slot.
    pub fn is_active( self ) -> bool {
        matches!( self, PlaybackState::Playing | PlaybackState::Paused )
    }
}


impl fmt::Display for PlaybackState {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        let label = match self {
            PlaybackState::Uninitialized => "Idle",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Finished => "Finished",
            PlaybackState::Paused => "Paused",
            PlaybackState::Playing => "Playing",
        };
        f.write_str( label )
    }
}


/// Runtime wrapper around one player program.
pub struct Backend {
    spec: BackendSpec,
    matcher: Regex,
    parser: ProgressParser,

    entry: Option<PlaylistEntry>,
    offset: f64,
    length: f64,
    step: f64,
    paused: bool,
    speed: f64,

    child: Option<Child>,
    exit_status: Option<ExitStatus>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    // Set once the end of the entry's range was reached and SIGTERM sent.
    cut: bool,

    buffer: Vec<u8>,
    spawned_at: Option<Instant>,
    spawn_offset: f64,
    last_output: Option<Instant>,
    spawn_count: u64,
}


impl Backend {
    /// Compiles a backend from its description.
    pub fn from_spec( spec: BackendSpec ) -> Result<Self, BackendError> {
        if spec.command.split_whitespace().next().is_none() {
            return Err( BackendError::EmptyCommand );
        }
        let matcher = RegexBuilder::new( &spec.pattern ).case_insensitive( true ).build()?;
        let parser = ProgressParser::new( spec.progress )?;
        Ok( Self {
            spec,
            matcher,
            parser,
            entry: None,
            offset: 0.0,
            length: 0.0,
            step: 0.0,
            paused: false,
            speed: 1.0,
            child: None,
            exit_status: None,
            stdin: None,
            stdout: None,
            stderr: None,
            cut: false,
            buffer: Vec::new(),
            spawned_at: None,
            spawn_offset: 0.0,
            last_output: None,
            spawn_count: 0,
        })
    }


    pub fn spec( &self ) -> &BackendSpec {
        &self.spec
    }


    /// Program name (first word of the command template).
    pub fn name( &self ) -> &str {
        self.spec.command.split_whitespace().next().unwrap_or( "" )
    }


    /// Returns true if this backend's pattern accepts the location.
    pub fn matches( &self, location: &str ) -> bool {
        self.matcher.is_match( location )
    }


    /// Returns true if the program resolves on the search path.
    pub fn is_installed( &self ) -> bool {
        which( self.name() ).is_some()
    }


    /// Readies the backend for `entry` at `offset` seconds without spawning.
    ///
    /// The known length is discarded when the entry changes.
    pub fn setup( &mut self, entry: &PlaylistEntry, offset: f64 ) {
        let changed = self.entry.as_ref().map( |e| e.id ) != Some( entry.id );
        if changed {
            self.length = entry.range_length().unwrap_or( 0.0 );
        }
        self.entry = Some( entry.clone() );
        self.offset = offset.max( 0.0 );
        self.step = 0.0;
    }


    /// Seeds a known position, e.g. when resuming a session.
    pub fn set_position( &mut self, position: Position ) {
        self.offset = position.elapsed.max( 0.0 );
        self.length = position.total.max( 0.0 );
    }


    /// Builds the concrete argv for the current entry and offset.
    pub fn command_line( &self ) -> Vec<String> {
        let ( location, start ) = match &self.entry {
            Some( entry ) => ( entry.location.as_str(), entry.start_offset() ),
            None => ( "", 0.0 ),
        };
        let units = ( ( start + self.offset ) * self.spec.fps ).round().max( 0.0 ) as u64;

        self.spec
            .command
            .split_whitespace()
            .map( |word| word.replace( "{file}", location ).replace( "{offset}", &units.to_string() ) )
            .collect()
    }


    /// Sets up `entry` at `offset` and starts the player.
    pub fn play( &mut self, entry: &PlaylistEntry, offset: f64 ) -> Result<(), BackendError> {
        self.setup( entry, offset );
        self.spawn()
    }


    /// Starts the player for the current entry, terminating any previous child.
    pub fn spawn( &mut self ) -> Result<(), BackendError> {
        self.stop();
        let start = self.entry.as_ref().ok_or( BackendError::NoEntry )?.start_offset();

        let argv = self.command_line();
        let ( program, args ) = argv.split_first().ok_or( BackendError::EmptyCommand )?;
        let path = which( program ).ok_or_else( || BackendError::NotInstalled( program.clone() ) )?;

        tracing::debug!( "Executing {}", argv.join( " " ) );
        let stdin = match self.spec.control {
            ControlChannel::Stdin => Stdio::piped(),
            ControlChannel::None => Stdio::null(),
        };
        let mut child = Command::new( &path )
            .args( args )
            .stdin( stdin )
            .stdout( Stdio::piped() )
            .stderr( Stdio::piped() )
            .spawn()
            .map_err( BackendError::Spawn )?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.stderr = child.stderr.take();
        for fd in self.output_fds() {
            if let Err( e ) = set_nonblocking( fd ) {
                tracing::warn!( "Could not make player pipe non-blocking: {}", e );
            }
        }

        let now = Instant::now();
        self.child = Some( child );
        self.exit_status = None;
        self.paused = false;
        self.step = 0.0;
        self.cut = false;
        self.buffer.clear();
        self.spawned_at = Some( now );
        self.spawn_offset = start + self.offset;
        self.last_output = Some( now );
        self.spawn_count += 1;

        if self.spec.control == ControlChannel::Stdin {
            let mut commands = Vec::new();
            if self.speed != 1.0 {
                commands.push( format!( "speed_set {}", self.speed ) );
            }
            if self.spawn_offset > 0.0 {
                commands.push( format!( "seek {} 2", self.spawn_offset.round() as u64 ) );
            }
            for command in commands {
                if let Err( e ) = self.send( &command ) {
                    tracing::warn!( "{}", e );
                }
            }
        }
        Ok(())
    }


    /// Terminates the child, resuming it first if it was suspended.
    ///
    /// @returns True if a child was running
    pub fn stop( &mut self ) -> bool {
        let Some( mut child ) = self.child.take() else {
            return false;
        };
        if self.paused && self.exit_status.is_none() {
            if let Err( e ) = signal( &child, libc::SIGCONT ) {
                tracing::warn!( "SIGCONT failed: {}", e );
            }
        }
        match terminate( &mut child ) {
            Ok( status ) => tracing::debug!( "{} exited: {}", self.name(), status ),
            Err( e ) => tracing::warn!( "Failed to terminate {}: {}", self.name(), e ),
        }
        self.paused = false;
        self.exit_status = None;
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        self.buffer.clear();
        true
    }


    /// Suspends or resumes the child.
    ///
    /// @returns The new pause flag
    pub fn toggle_pause( &mut self ) -> Result<bool, BackendError> {
        let Some( child ) = self.child.as_ref() else {
            return Ok( self.paused );
        };
        if self.exit_status.is_some() {
            return Ok( self.paused );
        }
        let sig = if self.paused { libc::SIGCONT } else { libc::SIGSTOP };
        signal( child, sig ).map_err( BackendError::Signal )?;
        self.paused = !self.paused;
        if !self.paused {
            // Time spent suspended is not silence.
            self.last_output = Some( Instant::now() );
        }
        Ok( self.paused )
    }


    /// Moves the desired offset by an accelerating relative step.
    ///
    /// Repeated calls in the same direction add up; a change of direction
    /// starts over from a single step.
    ///
    /// @returns False if the backend cannot seek
    pub fn seek( &mut self, direction: f64 ) -> bool {
        if !self.spec.progress.can_seek() || self.entry.is_none() {
            return false;
        }
        let base = if self.length > 0.0 { self.length * SEEK_FRACTION } else { UNKNOWN_LENGTH_SEEK };
        let delta = direction * base;
        self.step = if self.step * delta > 0.0 { self.step + delta } else { delta };
        let upper = if self.length > 0.0 { self.length } else { f64::MAX };
        self.offset = ( self.offset + self.step ).clamp( 0.0, upper );
        true
    }


    /// Sets the desired offset to an absolute position; negative values
    /// count back from the end.
    pub fn jump( &mut self, offset: f64 ) -> bool {
        if !self.spec.progress.can_seek() || self.entry.is_none() {
            return false;
        }
        self.step = 1.0;
        let target = if offset < 0.0 { self.length + offset } else { offset };
        self.offset = if self.length > 0.0 { target.clamp( 0.0, self.length ) } else { target.max( 0.0 ) };
        true
    }


    /// Reads whatever is available on one of the child's output pipes.
    ///
    /// A pipe that reports end of file is closed and no longer polled.
    pub fn read_ready( &mut self, fd: RawFd ) -> io::Result<usize> {
        let mut chunk = [ 0u8; READ_CHUNK ];
        let n = if self.stdout.as_ref().map( |p| p.as_raw_fd() ) == Some( fd ) {
            read_pipe( &mut self.stdout, &mut chunk )?
        } else if self.stderr.as_ref().map( |p| p.as_raw_fd() ) == Some( fd ) {
            read_pipe( &mut self.stderr, &mut chunk )?
        } else {
            0
        };
        if n > 0 {
            self.feed( &chunk[ ..n ] );
        }
        Ok( n )
    }


    /// Appends raw output to the progress buffer.
    pub fn feed( &mut self, chunk: &[ u8 ] ) {
        self.buffer.extend_from_slice( chunk );
        if self.buffer.len() > MAX_BUFFER {
            let excess = self.buffer.len() - MAX_BUFFER;
            self.buffer.drain( ..excess );
        }
        self.last_output = Some( Instant::now() );
    }


    /// Updates the position from buffered output.
    ///
    /// Complete lines are tried newest first; the trailing incomplete line
    /// is never parsed and is kept for the next call. Nothing changes while a seek is pending.
    pub fn parse_progress( &mut self ) -> Option<Position> {
        if self.is_seeking() {
            return None;
        }
        let start = self.entry.as_ref().map( |e| e.start_offset() ).unwrap_or( 0.0 );
        let ctx = ProgressContext {
            previous: Position::new(
                start + self.offset,
                if self.length > 0.0 { start + self.length } else { 0.0 },
            ),
            spawn_offset: self.spawn_offset,
            since_spawn: self.spawned_at.map( |t| t.elapsed() ).unwrap_or_default(),
        };

        let found = if self.spec.progress.reads_output() {
            let keep_from = self
                .buffer
                .iter()
                .rposition( |b| *b == b'\n' || *b == b'\r' )
                .map( |i| i + 1 )
                .unwrap_or( 0 );
            let found = self.buffer[ ..keep_from ]
                .split( |b| *b == b'\n' || *b == b'\r' )
                .rev()
                .find_map( |line| self.parser.parse( line, &ctx ) );
            self.buffer.drain( ..keep_from );
            found
        } else {
            self.parser.parse( b"", &ctx )
        };

        let raw = found?;
        let elapsed = ( raw.elapsed - start ).max( 0.0 );
        let total = match self.entry.as_ref().and_then( |e| e.range_length() ) {
            Some( length ) => length,
            None => ( raw.total - start ).max( 0.0 ),
        };
        let position = Position::new( elapsed, total );
        self.set_position( position );
        Some( position )
    }


    /// Reaps the child if it exited and enforces the entry's end offset.
    pub fn poll( &mut self ) -> PlaybackState {
        if let ( Some( child ), None ) = ( self.child.as_mut(), self.exit_status ) {
            match child.try_wait() {
                Ok( Some( status ) ) => {
                    tracing::debug!( "{} finished: {}", self.spec.command, status );
                    self.exit_status = Some( status );
                }
                Ok( None ) => {}
                Err( e ) => tracing::warn!( "Failed to poll player: {}", e ),
            }
        }

        if self.state() == PlaybackState::Playing && !self.cut {
            let end = self.entry.as_ref().and_then( |e| e.range_length() );
            if let ( Some( end ), Some( child ) ) = ( end, self.child.as_ref() ) {
                if self.offset >= end {
                    tracing::debug!( "Reached end of range at {:.1}s", end );
                    if let Err( e ) = signal( child, libc::SIGTERM ) {
                        tracing::warn!( "SIGTERM failed: {}", e );
                    }
                    self.cut = true;
                }
            }
        }
        self.state()
    }


    /// Current state, derived from the observables.
    pub fn state( &self ) -> PlaybackState {
        PlaybackState::derive(
            self.entry.is_some(),
            self.child.is_some(),
            self.exit_status.is_some(),
            self.paused,
        )
    }


    /// Writes one command line to the player's stdin.
    pub fn send( &mut self, command: &str ) -> Result<(), BackendError> {
        let stdin = self.stdin.as_mut().ok_or( BackendError::NoControlChannel )?;
        tracing::debug!( "Sending command {}", command );
        stdin
            .write_all( format!( "{}\n", command ).as_bytes() )
            .and_then( |_| stdin.flush() )
            .map_err( BackendError::Control )
    }


    /// Sets playback speed on players with a control channel.
    pub fn set_speed( &mut self, speed: f64 ) -> Result<f64, BackendError> {
        if self.spec.control != ControlChannel::Stdin {
            return Err( BackendError::NoControlChannel );
        }
        self.speed = ( speed * 10.0 ).round().clamp( 1.0, 40.0 ) / 10.0;
        if self.stdin.is_some() {
            self.send( &format!( "speed_set {}", self.speed ) )?;
        }
        Ok( self.speed )
    }


    /// Time since the child last produced output, while it is playing.
    pub fn silent_for( &self, now: Instant ) -> Option<Duration> {
        if self.state() != PlaybackState::Playing {
            return None;
        }
        self.last_output.map( |t| now.saturating_duration_since( t ) )
    }


    /// Raw fds of the still-open output pipes.
    pub fn output_fds( &self ) -> Vec<RawFd> {
        self.stdout
            .as_ref()
            .map( |p| p.as_raw_fd() )
            .into_iter()
            .chain( self.stderr.as_ref().map( |p| p.as_raw_fd() ) )
            .collect()
    }


    pub fn entry( &self ) -> Option<&PlaylistEntry> {
        self.entry.as_ref()
    }


    pub fn position( &self ) -> Position {
        Position::new( self.offset, self.length )
    }


    pub fn offset( &self ) -> f64 {
        self.offset
    }


    pub fn length( &self ) -> f64 {
        self.length
    }


    pub fn is_paused( &self ) -> bool {
        self.paused
    }


    /// A relative or absolute seek is waiting for the next spawn.
    pub fn is_seeking( &self ) -> bool {
        self.step != 0.0
    }


    pub fn speed( &self ) -> f64 {
        self.speed
    }


    /// Number of child processes started so far.
    pub fn spawn_count( &self ) -> u64 {
        self.spawn_count
    }


    /// Process id of the live child.
    pub fn pid( &self ) -> Option<u32> {
        self.child.as_ref().map( |c| c.id() )
    }
}


impl fmt::Debug for Backend {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "Backend" )
            .field( "command", &self.spec.command )
            .field( "state", &self.state() )
            .field( "offset", &self.offset )
            .field( "length", &self.length )
            .finish()
    }
}


impl Drop for Backend {
    fn drop( &mut self ) {
        self.stop();
    }
}


/// Resolves a program on `PATH` (default `/usr/bin:/bin`).
pub fn which( program: &str ) -> Option<PathBuf> {
    if program.contains( '/' ) {
        let path = PathBuf::from( program );
        return is_executable( &path ).then_some( path );
    }
    let search = std::env::var_os( "PATH" ).unwrap_or_else( || DEFAULT_PATH.into() );
    std::env::split_paths( &search )
        .map( |dir| dir.join( program ) )
        .find( |candidate| is_executable( candidate ) )
}


fn is_executable( path: &Path ) -> bool {
    path.metadata()
        .map( |m| m.is_file() && m.permissions().mode() & 0o111 != 0 )
        .unwrap_or( false )
}


fn signal( child: &Child, sig: libc::c_int ) -> io::Result<()> {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill( child.id() as libc::pid_t, sig ) };
    if rc == 0 {
        Ok(())
    } else {
        Err( io::Error::last_os_error() )
    }
}


// SIGTERM, a short grace period, then SIGKILL. Always reaps.
fn terminate( child: &mut Child ) -> io::Result<ExitStatus> {
    if let Some( status ) = child.try_wait()? {
        return Ok( status );
    }
    signal( child, libc::SIGTERM )?;
    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if let Some( status ) = child.try_wait()? {
            return Ok( status );
        }
        std::thread::sleep( Duration::from_millis( 10 ) );
    }
    child.kill()?;
    child.wait()
}


fn set_nonblocking( fd: RawFd ) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own.
    let flags = unsafe { libc::fcntl( fd, libc::F_GETFL ) };
    if flags < 0 {
        return Err( io::Error::last_os_error() );
    }
    let rc = unsafe { libc::fcntl( fd, libc::F_SETFL, flags | libc::O_NONBLOCK ) };
    if rc < 0 {
        return Err( io::Error::last_os_error() );
    }
    Ok(())
}


fn read_pipe<R: Read>( pipe: &mut Option<R>, buf: &mut [ u8 ] ) -> io::Result<usize> {
    let Some( reader ) = pipe.as_mut() else {
        return Ok( 0 );
    };
    match reader.read( buf ) {
        Ok( 0 ) => {
            *pipe = None;
            Ok( 0 )
        }
        Ok( n ) => Ok( n ),
        Err( e ) if matches!( e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted ) => Ok( 0 ),
        Err( e ) => {
            *pipe = None;
            Err( e )
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::entry::EntryId;


    fn sleeper() -> Backend {
        Backend::from_spec( BackendSpec::new( "sleep {offset}", r"\.ogg$", 1.0, ProgressFormat::Gst ) ).unwrap()
    }


    fn entry( id: u64 ) -> PlaylistEntry {
        PlaylistEntry::new( EntryId( id ), format!( "/music/{}.ogg", id ) )
    }


    #[test]
    fn test_state_derivation_is_exhaustive() {
        use PlaybackState::*;
        assert_eq!( PlaybackState::derive( false, false, false, false ), Uninitialized );
        assert_eq!( PlaybackState::derive( false, true, true, true ), Uninitialized );
        assert_eq!( PlaybackState::derive( true, false, false, true ), Stopped );
        assert_eq!( PlaybackState::derive( true, true, true, false ), Finished );
        assert_eq!( PlaybackState::derive( true, true, true, true ), Finished );
        assert_eq!( PlaybackState::derive( true, true, false, true ), Paused );
        assert_eq!( PlaybackState::derive( true, true, false, false ), Playing );
    }


    #[test]
    fn test_command_line_substitution() {
        let mut backend = Backend::from_spec( BackendSpec::new(
            "mpg123 -q -v -k {offset} {file}",
            r"\.mp3$",
            38.28,
            ProgressFormat::FrameOffset,
        ) ).unwrap();
        let e = PlaylistEntry::new( EntryId( 1 ), "/music/My Song.mp3" );
        backend.setup( &e, 10.0 );

        assert_eq!( backend.command_line(), vec![ "mpg123", "-q", "-v", "-k", "383", "/music/My Song.mp3" ] );
    }


    #[test]
    fn test_command_line_includes_range_start() {
        let mut backend = sleeper();
        let e = entry( 1 ).with_range( Some( 60.0 ), Some( 90.0 ) );
        backend.setup( &e, 5.0 );
        assert_eq!( backend.command_line(), vec![ "sleep", "65" ] );
        assert_eq!( backend.length(), 30.0 );
    }


    #[test]
    fn test_matches_case_insensitive() {
        let backend = sleeper();
        assert!( backend.matches( "/x/LOUD.OGG" ) );
        assert!( !backend.matches( "/x/loud.mp3" ) );
    }


    #[test]
    fn test_empty_command_rejected() {
        let result = Backend::from_spec( BackendSpec::new( "  ", ".*", 1.0, ProgressFormat::NoOffset ) );
        assert!( matches!( result, Err( BackendError::EmptyCommand ) ) );
    }


    #[test]
    fn test_setup_resets_length_only_on_entry_change() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.set_position( Position::new( 10.0, 200.0 ) );

        backend.setup( &entry( 1 ), 50.0 );
        assert_eq!( backend.length(), 200.0 );

        backend.setup( &entry( 2 ), 0.0 );
        assert_eq!( backend.length(), 0.0 );
        assert_eq!( backend.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_seek_accelerates_and_resets_on_direction_change() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.set_position( Position::new( 100.0, 1000.0 ) );

        assert!( backend.seek( 1.0 ) );
        assert_eq!( backend.offset(), 102.0 );
        backend.seek( 1.0 );
        assert_eq!( backend.offset(), 106.0 );
        backend.seek( -1.0 );
        assert_eq!( backend.offset(), 104.0 );
        assert!( backend.is_seeking() );
    }


    #[test]
    fn test_seek_clamps_to_bounds() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.set_position( Position::new( 1.0, 1000.0 ) );
        backend.seek( -1.0 );
        assert_eq!( backend.offset(), 0.0 );

        backend.jump( 5000.0 );
        assert_eq!( backend.offset(), 1000.0 );
        backend.jump( -10.0 );
        assert_eq!( backend.offset(), 990.0 );
    }


    #[test]
    fn test_seek_with_unknown_length() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.seek( 1.0 );
        assert_eq!( backend.offset(), 1.0 );
    }


    #[test]
    fn test_no_offset_backend_cannot_seek() {
        let mut backend = Backend::from_spec( BackendSpec::new( "sleep 5", ".*", 1.0, ProgressFormat::NoOffset ) ).unwrap();
        backend.setup( &entry( 1 ), 0.0 );
        assert!( !backend.seek( 1.0 ) );
        assert!( !backend.jump( 10.0 ) );
        assert!( !backend.is_seeking() );
    }


    #[test]
    fn test_parse_progress_tolerates_split_lines() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );

        backend.feed( b"Playing file:///some/file\n\nTime: 0:01:4" );
        assert_eq!( backend.parse_progress(), None );
        assert_eq!( backend.position(), Position::new( 0.0, 0.0 ) );

        backend.feed( b"7.17 of 0:40:57.82\r" );
        assert_eq!( backend.parse_progress(), Some( Position::new( 107.0, 2457.0 ) ) );
        assert_eq!( backend.position(), Position::new( 107.0, 2457.0 ) );
    }


    #[test]
    fn test_truncated_frame_offset_line_is_not_parsed() {
        let mut backend = Backend::from_spec( BackendSpec::new(
            "mpg123 -q -v -k {offset} {file}",
            r"\.mp3$",
            38.28,
            ProgressFormat::FrameOffset,
        ) ).unwrap();
        backend.setup( &PlaylistEntry::new( EntryId( 1 ), "/music/a.mp3" ), 0.0 );

        backend.feed( b"Frame#  1234 [ 5678], Time: 00:32.24 [02:2" );
        assert_eq!( backend.parse_progress(), None );
        assert_eq!( backend.position(), Position::new( 0.0, 0.0 ) );

        backend.feed( b"8.00], RVA:   off\r" );
        assert_eq!( backend.parse_progress(), Some( Position::new( 32.0, 180.0 ) ) );
    }


    #[test]
    fn test_truncated_time_remaining_line_is_not_parsed() {
        let mut backend = Backend::from_spec( BackendSpec::new(
            "madplay -v --display-time=remaining -s {offset} {file}",
            r"\.mp3$",
            1.0,
            ProgressFormat::TimeRemaining,
        ) ).unwrap();
        backend.setup( &PlaylistEntry::new( EntryId( 1 ), "/music/a.mp3" ), 0.0 );

        backend.feed( b"\r-00:03:25\r-00:03:2" );
        assert_eq!( backend.parse_progress(), Some( Position::new( 0.0, 205.0 ) ) );
        assert_eq!( backend.parse_progress(), None );
        assert_eq!( backend.position(), Position::new( 0.0, 205.0 ) );

        backend.feed( b"0\r" );
        assert_eq!( backend.parse_progress(), Some( Position::new( 5.0, 205.0 ) ) );
    }


    #[test]
    fn test_parse_progress_prefers_newest_line() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.feed( b"\rTime: 0:00:01.00 of 0:01:00.00\rTime: 0:00:02.00 of 0:01:00.00\rgarbage" );

        assert_eq!( backend.parse_progress(), Some( Position::new( 2.0, 60.0 ) ) );
        assert_eq!( backend.parse_progress(), None );
    }


    #[test]
    fn test_garbled_output_keeps_previous_position() {
        let mut backend = sleeper();
        backend.setup( &entry( 1 ), 0.0 );
        backend.set_position( Position::new( 5.0, 50.0 ) );
        backend.feed( b"\x00\x01 nonsense\n" );

        assert_eq!( backend.parse_progress(), None );
        assert_eq!( backend.position(), Position::new( 5.0, 50.0 ) );
    }


    #[test]
    fn test_spawn_missing_program() {
        let mut backend = Backend::from_spec( BackendSpec::new(
            "tapedeck-no-such-player {file}",
            ".*",
            1.0,
            ProgressFormat::Gst,
        ) ).unwrap();
        let result = backend.play( &entry( 1 ), 0.0 );

        assert!( matches!( result, Err( BackendError::NotInstalled( _ ) ) ) );
        assert_eq!( backend.state(), PlaybackState::Stopped );
        assert!( !backend.is_installed() );
    }


    #[test]
    fn test_play_pause_stop_lifecycle() {
        let mut backend = sleeper();
        assert_eq!( backend.state(), PlaybackState::Uninitialized );

        backend.play( &entry( 1 ), 30.0 ).unwrap();
        assert_eq!( backend.poll(), PlaybackState::Playing );
        assert_eq!( backend.spawn_count(), 1 );

        assert!( backend.toggle_pause().unwrap() );
        assert_eq!( backend.poll(), PlaybackState::Paused );
        assert!( !backend.toggle_pause().unwrap() );

        assert!( backend.toggle_pause().unwrap() );
        assert!( backend.stop() );
        assert_eq!( backend.state(), PlaybackState::Stopped );
        assert!( !backend.stop() );
    }


    #[test]
    fn test_organic_exit_is_finished() {
        let mut backend = sleeper();
        backend.play( &entry( 1 ), 0.0 ).unwrap();

        let deadline = Instant::now() + Duration::from_secs( 5 );
        while backend.poll() != PlaybackState::Finished && Instant::now() < deadline {
            std::thread::sleep( Duration::from_millis( 10 ) );
        }
        assert_eq!( backend.state(), PlaybackState::Finished );

        backend.stop();
        assert_eq!( backend.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_speed_requires_control_channel() {
        let mut backend = sleeper();
        assert!( matches!( backend.set_speed( 1.5 ), Err( BackendError::NoControlChannel ) ) );

        let mut controlled = Backend::from_spec(
            BackendSpec::new( "sleep 5", ".*", 1.0, ProgressFormat::MPlayer ).with_control( ControlChannel::Stdin ),
        ).unwrap();
        assert_eq!( controlled.set_speed( 1.26 ).unwrap(), 1.3 );
        assert_eq!( controlled.set_speed( 0.0 ).unwrap(), 0.1 );
    }


    #[test]
    fn test_which_finds_sh() {
        assert!( which( "sh" ).is_some() );
        assert!( which( "tapedeck-definitely-missing" ).is_none() );
    }
}
