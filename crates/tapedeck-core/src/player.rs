//! Playback coordinator
//!
//! The [`Player`] owns the playlist, the backend registry and the timeout
//! queue. It is the single surface input handlers and the remote-control
//! channel call into: play, seek, pause, stop, next and previous. Deferred
//! work (debounced restarts, progress polling, status expiry, retries) is
//! expressed as [`Timed`] actions on the queue and dispatched here.

use std::os::unix::io::RawFd;
use std::time::{ Duration, Instant };

use crate::backend::{ Backend, BackendRegistry, PlaybackState, Position };
use crate::command::RemoteCommand;
use crate::entry::{ EntryId, PlaylistEntry };
use crate::event_loop;
use crate::mixer::{ Mixer, VolumeAction };
use crate::playlist::{ Playlist, PlaylistError };
use crate::scheduler::Direction;
use crate::session::ResumeState;
use crate::status::Status;
use crate::timeout::{ TimeoutId, TimeoutQueue };


/// Step used by the speed keys.
pub const SPEED_STEP: f64 = 0.1;


/// Deferred actions scheduled on the player's timeout queue.
#[derive( Debug, Clone, PartialEq )]
pub enum Timed {
    /// Debounced (re)start of an entry at an offset.
    Play { entry: PlaylistEntry, offset: f64 },

    /// Move through the playlist, e.g. past an unplayable entry.
    Advance( Direction ),

    /// Re-read the current backend's progress.
    PollProgress,

    /// Expire the transient status message.
    ClearStatus,
}


/// Timing knobs.
#[derive( Debug, Clone )]
pub struct PlayerConfig {
    /// Quiet period before a seek or track change actually restarts the player.
    pub seek_debounce: Duration,

    /// Loop wake-up interval while a player is running.
    pub poll_interval: Duration,

    /// Interval between progress parses.
    pub progress_interval: Duration,

    /// Delay before skipping an entry no backend can play.
    pub retry_delay: Duration,

    /// Lifetime of transient status messages.
    pub message_duration: Duration,

    /// Stop and advance when a playing child is silent this long.
    pub watchdog: Option<Duration>,
}


impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            seek_debounce: Duration::from_millis( 500 ),
            poll_interval: Duration::from_millis( 500 ),
            progress_interval: Duration::from_secs( 1 ),
            retry_delay: Duration::from_secs( 1 ),
            message_duration: Duration::from_secs( 2 ),
            watchdog: None,
        }
    }
}


/// Result of checking the current backend for organic completion.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Completion {
    /// Nothing finished since the last check.
    Idle,

    /// The track finished and the next entry was started.
    Advanced( EntryId ),

    /// The track finished and the playlist is set to stop after it.
    Halted,

    /// The track finished and the playlist has no next entry.
    Exhausted,
}


/// Playback coordinator.
pub struct Player {
    registry: BackendRegistry,
    current: Option<usize>,
    playlist: Playlist,
    timeouts: TimeoutQueue<Timed>,
    play_tid: Option<TimeoutId>,
    // Pending skip past an entry no backend could play.
    advance_tid: Option<TimeoutId>,
    poll_tid: Option<TimeoutId>,
    status: Status,
    mixer: Option<Box<dyn Mixer>>,
    config: PlayerConfig,
    last_state: PlaybackState,
}


impl Player {
    /// Creates a coordinator over the given backends and playlist.
    pub fn new( registry: BackendRegistry, playlist: Playlist, config: PlayerConfig ) -> Self {
        Self {
            registry,
            current: None,
            playlist,
            timeouts: TimeoutQueue::new(),
            play_tid: None,
            advance_tid: None,
            poll_tid: None,
            status: Status::new(),
            mixer: None,
            config,
            last_state: PlaybackState::Uninitialized,
        }
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    pub fn playlist_mut( &mut self ) -> &mut Playlist {
        &mut self.playlist
    }


    pub fn registry( &self ) -> &BackendRegistry {
        &self.registry
    }


    pub fn registry_mut( &mut self ) -> &mut BackendRegistry {
        &mut self.registry
    }


    pub fn config( &self ) -> &PlayerConfig {
        &self.config
    }


    pub fn status( &self ) -> &Status {
        &self.status
    }


    pub fn set_mixer( &mut self, mixer: Box<dyn Mixer> ) {
        self.mixer = Some( mixer );
    }


    /// The current backend, if one was ever selected.
    pub fn backend( &self ) -> Option<&Backend> {
        self.current.and_then( |i| self.registry.get( i ) )
    }


    fn backend_mut( &mut self ) -> Option<&mut Backend> {
        self.current.and_then( |i| self.registry.get_mut( i ) )
    }


    pub fn state( &self ) -> PlaybackState {
        self.backend().map( |b| b.state() ).unwrap_or( PlaybackState::Uninitialized )
    }


    /// Entry loaded in the current backend.
    pub fn entry( &self ) -> Option<&PlaylistEntry> {
        self.backend().and_then( |b| b.entry() )
    }


    pub fn position( &self ) -> Position {
        self.backend().map( |b| b.position() ).unwrap_or_default()
    }


    /// Shows a transient status message.
    pub fn notify( &mut self, message: impl Into<String> ) {
        let message = message.into();
        tracing::debug!( "Status: {}", message );
        let clear = self.timeouts.add( self.config.message_duration, Timed::ClearStatus );
        if let Some( old ) = self.status.set_message( message, clear ) {
            self.timeouts.remove( old );
        }
    }


    fn refresh_status( &mut self ) {
        let text = match ( self.state(), self.entry() ) {
            ( PlaybackState::Playing, Some( e ) ) => format!( "Playing: {}", e.name ),
            ( PlaybackState::Paused, Some( e ) ) => format!( "Paused: {}", e.name ),
            ( PlaybackState::Stopped | PlaybackState::Finished, Some( e ) ) => format!( "Stopped: {}", e.name ),
            _ => String::new(),
        };
        self.status.set_default( text );
    }


    /// Selects the backend for `entry` and readies it without spawning.
    ///
    /// The previous backend is stopped quietly first.
    ///
    /// @returns False if no installed backend can play the entry
    pub fn setup_backend( &mut self, entry: &PlaylistEntry, offset: f64 ) -> bool {
        if let Some( backend ) = self.backend_mut() {
            backend.stop();
        }
        let Some( index ) = self.registry.pick_backend( entry ) else {
            self.notify( "Backend not found!" );
            return false;
        };
        self.current = Some( index );
        if let Some( backend ) = self.backend_mut() {
            backend.setup( entry, offset );
        }
        self.refresh_status();
        true
    }


    /// Readies `entry` at a known position without playing it.
    pub fn setup_stopped( &mut self, entry: &PlaylistEntry, offset: f64, length: f64 ) -> bool {
        if !self.setup_backend( entry, offset ) {
            return false;
        }
        if let Some( backend ) = self.backend_mut() {
            backend.set_position( Position::new( offset, length ) );
        }
        true
    }


    /// Starts `entry` at `offset` seconds right away.
    ///
    /// If no backend can play it, the playlist moves on after a delay.
    ///
    /// @returns True if a player process was started
    pub fn play( &mut self, entry: &PlaylistEntry, offset: f64 ) -> bool {
        self.cancel_delayed_play();
        if !self.setup_backend( entry, offset ) {
            let id = self.timeouts.add( self.config.retry_delay, Timed::Advance( Direction::Forward ) );
            self.advance_tid = Some( id );
            return false;
        }

        let result = match self.backend_mut() {
            Some( backend ) => backend.spawn(),
            None => return false,
        };
        match result {
            Ok(()) => {
                tracing::info!( "Playing {} from {:.0}s", entry.name, offset );
                self.last_state = PlaybackState::Playing;
                self.schedule_progress();
                self.refresh_status();
                true
            }
            Err( e ) => {
                tracing::warn!( "Failed to play {}: {}", entry.location, e );
                self.refresh_status();
                self.notify( format!( "play() {}", e ) );
                false
            }
        }
    }


    /// Makes the entry at `index` active and plays it.
    pub fn play_index( &mut self, index: usize ) -> bool {
        match self.playlist.set_active( index ) {
            Some( entry ) => self.play( &entry, 0.0 ),
            None => false,
        }
    }


    /// Plays `entry` once no further request arrives within the debounce period.
    pub fn delayed_play( &mut self, entry: PlaylistEntry, offset: f64 ) {
        self.cancel_delayed_play();
        let id = self.timeouts.add( self.config.seek_debounce, Timed::Play { entry, offset } );
        self.play_tid = Some( id );
    }


    // Drops a pending start and a pending skip; a newer request supersedes both.
    fn cancel_delayed_play( &mut self ) {
        if let Some( id ) = self.play_tid.take() {
            self.timeouts.remove( id );
        }
        if let Some( id ) = self.advance_tid.take() {
            self.timeouts.remove( id );
        }
    }


    /// Moves to the next or previous entry and plays it after the debounce.
    ///
    /// The backend is set up immediately so the new track shows at once.
    pub fn next_prev( &mut self, direction: Direction ) -> Option<EntryId> {
        let Some( entry ) = self.playlist.advance( direction ) else {
            tracing::debug!( "No entry {:?}", direction );
            return None;
        };
        let id = entry.id;
        self.setup_backend( &entry, 0.0 );
        self.delayed_play( entry, 0.0 );
        Some( id )
    }


    /// Relative seek; the restart happens after the debounce.
    pub fn seek( &mut self, direction: f64 ) {
        let Some( backend ) = self.backend_mut() else {
            return;
        };
        if !backend.seek( direction ) {
            return;
        }
        let target = backend.entry().cloned().map( |e| ( e, backend.offset() ) );
        if let Some( ( entry, offset ) ) = target {
            self.delayed_play( entry, offset );
        }
    }


    /// Absolute seek; negative offsets count back from the end.
    pub fn jump( &mut self, offset: f64 ) {
        let Some( backend ) = self.backend_mut() else {
            return;
        };
        if !backend.jump( offset ) {
            return;
        }
        let target = backend.entry().cloned().map( |e| ( e, backend.offset() ) );
        if let Some( ( entry, offset ) ) = target {
            self.delayed_play( entry, offset );
        }
    }


    pub fn toggle_pause( &mut self ) {
        let result = match self.backend_mut() {
            Some( backend ) if backend.state().is_active() => backend.toggle_pause(),
            _ => return,
        };
        if let Err( e ) = result {
            tracing::warn!( "{}", e );
            self.notify( e.to_string() );
        }
        self.refresh_status();
    }


    /// Stops a running player, or plays the loaded entry.
    pub fn toggle_stop( &mut self ) {
        match self.state() {
            PlaybackState::Playing | PlaybackState::Paused => self.stop( false ),
            PlaybackState::Stopped => {
                let target = self.backend().and_then( |b| b.entry().cloned().map( |e| ( e, b.offset() ) ) );
                if let Some( ( entry, offset ) ) = target {
                    self.play( &entry, offset );
                }
            }
            PlaybackState::Finished => {
                if let Some( entry ) = self.entry().cloned() {
                    self.play( &entry, 0.0 );
                }
            }
            PlaybackState::Uninitialized => {
                let entry = match self.playlist.active().cloned() {
                    Some( entry ) => Some( entry ),
                    None => self.playlist.advance( Direction::Forward ),
                };
                if let Some( entry ) = entry {
                    self.play( &entry, 0.0 );
                }
            }
        }
    }


    /// Stops the player; a pending delayed start is dropped as well.
    pub fn stop( &mut self, quiet: bool ) {
        self.cancel_delayed_play();
        if let Some( backend ) = self.backend_mut() {
            backend.stop();
        }
        if !quiet {
            self.refresh_status();
        }
    }


    /// Fires every due timed action.
    pub fn run_timers( &mut self, now: Instant ) {
        for action in self.timeouts.take_due( now ) {
            self.fire( action );
        }
    }


    fn fire( &mut self, action: Timed ) {
        tracing::trace!( "Timeout: {:?}", action );
        match action {
            Timed::Play { entry, offset } => {
                self.play_tid = None;
                self.play( &entry, offset );
            }
            Timed::Advance( direction ) => {
                self.advance_tid = None;
                self.next_prev( direction );
            }
            Timed::PollProgress => {
                self.poll_tid = None;
                self.poll_progress();
            }
            Timed::ClearStatus => self.status.clear_message(),
        }
    }


    fn schedule_progress( &mut self ) {
        if let Some( id ) = self.poll_tid.take() {
            self.timeouts.remove( id );
        }
        self.poll_tid = Some( self.timeouts.add( self.config.progress_interval, Timed::PollProgress ) );
    }


    // Parses progress and re-arms itself while the player runs and no seek
    // is pending.
    fn poll_progress( &mut self ) {
        if let Some( id ) = self.poll_tid.take() {
            self.timeouts.remove( id );
        }
        let Some( backend ) = self.backend_mut() else {
            return;
        };
        if !backend.state().is_active() || backend.is_seeking() {
            return;
        }
        backend.parse_progress();
        self.schedule_progress();
    }


    /// Descriptors of the current player's output pipes.
    pub fn backend_fds( &self ) -> Vec<RawFd> {
        self.backend().map( |b| b.output_fds() ).unwrap_or_default()
    }


    /// Reads ready output from the current player.
    pub fn read_backend( &mut self, fd: RawFd ) {
        let result = match self.backend_mut() {
            Some( backend ) => backend.read_ready( fd ),
            None => return,
        };
        match result {
            Ok( n ) if n > 0 && self.poll_tid.is_none() => self.poll_progress(),
            Ok( _ ) => {}
            Err( e ) => tracing::warn!( "Reading player output failed: {}", e ),
        }
    }


    /// Reaps the player and advances the playlist when it just finished.
    ///
    /// With a watchdog configured, a player that has been silent too long is
    /// treated as finished.
    pub fn check_finished( &mut self, now: Instant ) -> Completion {
        let state = match self.backend_mut() {
            Some( backend ) => backend.poll(),
            None => PlaybackState::Uninitialized,
        };

        let stalled = match ( self.config.watchdog, self.backend().and_then( |b| b.silent_for( now ) ) ) {
            ( Some( limit ), Some( silent ) ) => silent >= limit,
            _ => false,
        };
        let just_finished = state == PlaybackState::Finished && self.last_state != PlaybackState::Finished;
        self.last_state = state;

        if stalled {
            tracing::warn!( "Player produced no output for {:?}, skipping", self.config.watchdog );
            self.stop( true );
            self.last_state = self.state();
            self.notify( "Player stalled" );
        } else if !just_finished {
            return Completion::Idle;
        }

        if self.playlist.stop_after() {
            self.refresh_status();
            return Completion::Halted;
        }
        match self.playlist.advance( Direction::Forward ) {
            Some( entry ) => {
                self.play( &entry, 0.0 );
                Completion::Advanced( entry.id )
            }
            None => {
                self.stop( false );
                Completion::Exhausted
            }
        }
    }


    /// How long the main loop may block before something is due.
    pub fn next_wait( &self, now: Instant ) -> Option<Duration> {
        event_loop::wait_timeout(
            self.timeouts.next_delay( now ),
            self.state() == PlaybackState::Playing,
            self.config.poll_interval,
        )
    }


    /// Applies a volume change through the mixer.
    pub fn volume( &mut self, action: VolumeAction, value: i32 ) {
        let Some( mixer ) = self.mixer.as_mut() else {
            self.notify( "No mixer." );
            return;
        };
        let result = match action {
            VolumeAction::Set => {
                let level = value.clamp( 0, 100 ) as u8;
                mixer.set_volume( level ).map( |_| level )
            }
            VolumeAction::Cue => mixer.cue( value ),
        };
        let message = match result {
            Ok( level ) => format!( "{} volume {}%", mixer.name(), level ),
            Err( e ) => format!( "Mixer error: {}", e ),
        };
        self.notify( message );
    }


    /// Digit keys: 0 is silence, 9 is full volume.
    pub fn key_volume( &mut self, digit: u32 ) {
        self.volume( VolumeAction::Set, ( digit.min( 9 ) * 100 / 9 ) as i32 );
    }


    /// Switches the mixer to its next channel.
    pub fn toggle_mixer( &mut self ) {
        let Some( mixer ) = self.mixer.as_mut() else {
            self.notify( "No mixer." );
            return;
        };
        let message = match mixer.toggle().and_then( |_| mixer.volume() ) {
            Ok( level ) => format!( "{} volume {}%", mixer.name(), level ),
            Err( e ) => format!( "Mixer error: {}", e ),
        };
        self.notify( message );
    }


    /// Changes playback speed by `delta` on players that accept commands.
    pub fn change_speed( &mut self, delta: f64 ) {
        let Some( backend ) = self.backend_mut() else {
            return;
        };
        let target = backend.speed() + delta;
        self.apply_speed( target );
    }


    pub fn reset_speed( &mut self ) {
        self.apply_speed( 1.0 );
    }


    fn apply_speed( &mut self, speed: f64 ) {
        let result = match self.backend_mut() {
            Some( backend ) => backend.set_speed( speed ),
            None => return,
        };
        let message = match result {
            Ok( speed ) => format!( "Speed: {:.0}%", speed * 100.0 ),
            Err( e ) => e.to_string(),
        };
        self.notify( message );
    }


    /// Runs one remote-control command.
    ///
    /// @returns False if the command asks the controller to quit
    pub fn execute( &mut self, command: &RemoteCommand ) -> bool {
        tracing::debug!( "Remote command: {}", command );
        match command {
            RemoteCommand::Pause => self.toggle_pause(),
            RemoteCommand::Next => {
                self.next_prev( Direction::Forward );
            }
            RemoteCommand::Prev => {
                self.next_prev( Direction::Backward );
            }
            RemoteCommand::Forward => self.seek( 1.0 ),
            RemoteCommand::Backward => self.seek( -1.0 ),
            RemoteCommand::Play | RemoteCommand::Stop => self.toggle_stop(),
            RemoteCommand::Volume { action, value } => self.volume( *action, *value ),
            RemoteCommand::Add { location } => {
                if let Err( e ) = self.add_location( location ) {
                    tracing::warn!( "{}", e );
                }
            }
            RemoteCommand::Jump { seconds } => self.jump( *seconds ),
            RemoteCommand::Empty => self.playlist.clear(),
            RemoteCommand::Quit => return false,
        }
        true
    }


    /// Adds a file, directory or URL to the playlist using this
    /// player's backends to filter playable files.
    pub fn add_location( &mut self, location: &str ) -> Result<usize, PlaylistError> {
        match self.playlist.add_location( location, &self.registry ) {
            Ok( n ) => {
                self.notify( format!( "Added {} entries", n ) );
                Ok( n )
            }
            Err( e ) => {
                self.notify( e.to_string() );
                Err( e )
            }
        }
    }


    /// Snapshot for the resume file.
    pub fn resume_state( &self ) -> ResumeState {
        let position = self.position();
        ResumeState {
            repeat: self.playlist.repeat(),
            random: self.playlist.random(),
            entries: self.playlist.entries().to_vec(),
            entry: self.entry().map( |e| e.id ),
            offset: position.elapsed,
            length: position.total,
        }
    }


    /// Restores a snapshot: playlist, flags, and the stopped backend.
    pub fn restore( &mut self, state: ResumeState ) {
        self.playlist.restore( state.entries, state.repeat, state.random );
        let entry = state
            .entry
            .and_then( |id| self.playlist.index_of( id ) )
            .and_then( |i| self.playlist.get( i ) )
            .cloned();
        if let Some( entry ) = entry {
            self.setup_stopped( &entry, state.offset, state.length );
        }
    }


    /// Stops the player and drops pending work.
    pub fn shutdown( &mut self ) {
        self.stop( true );
        self.timeouts.clear();
        self.play_tid = None;
        self.advance_tid = None;
        self.poll_tid = None;
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::backend::{ BackendSpec, ProgressFormat };
    use crate::mixer::MixerError;
    use crate::scheduler::Scheduler;


    fn sleep_registry() -> BackendRegistry {
        BackendRegistry::new( vec![
            BackendSpec::new( "tapedeck-missing-player {file}", r"\.wav$", 1.0, ProgressFormat::Gst ),
            BackendSpec::new( "sleep {offset}", r"\.ogg$", 1.0, ProgressFormat::Gst ),
        ] ).unwrap()
    }


    fn player( names: &[ &str ] ) -> Player {
        let mut playlist = Playlist::with_scheduler( Scheduler::with_seed( 1 ) );
        for name in names {
            playlist.add( format!( "/music/{}", name ) );
        }
        Player::new( sleep_registry(), playlist, PlayerConfig::default() )
    }


    fn entry( player: &Player, index: usize ) -> PlaylistEntry {
        player.playlist().get( index ).cloned().unwrap()
    }


    fn wait_for( player: &mut Player, mut done: impl FnMut( Completion ) -> bool ) -> Completion {
        let deadline = Instant::now() + Duration::from_secs( 5 );
        loop {
            let completion = player.check_finished( Instant::now() );
            if done( completion ) || Instant::now() > deadline {
                return completion;
            }
            std::thread::sleep( Duration::from_millis( 10 ) );
        }
    }


    #[test]
    fn test_initial_state() {
        let player = player( &[ "a.ogg" ] );
        assert_eq!( player.state(), PlaybackState::Uninitialized );
        assert!( player.entry().is_none() );
        assert_eq!( player.next_wait( Instant::now() ), None );
    }


    #[test]
    fn test_play_and_status() {
        let mut player = player( &[ "a.ogg" ] );
        let e = entry( &player, 0 );

        assert!( player.play( &e, 30.0 ) );
        assert_eq!( player.state(), PlaybackState::Playing );
        assert_eq!( player.status().text(), "Playing: a.ogg" );
        assert_eq!( player.next_wait( Instant::now() ), Some( Duration::from_millis( 500 ) ) );
        assert_eq!( player.backend_fds().len(), 2 );

        player.toggle_pause();
        assert_eq!( player.state(), PlaybackState::Paused );
        assert_eq!( player.status().text(), "Paused: a.ogg" );

        player.toggle_stop();
        assert_eq!( player.state(), PlaybackState::Stopped );
        assert_eq!( player.status().text(), "Stopped: a.ogg" );
    }


    #[test]
    fn test_seek_burst_spawns_once() {
        let mut player = player( &[ "a.ogg" ] );
        let e = entry( &player, 0 );
        player.play( &e, 30.0 );
        let spawns = player.backend().map( |b| b.spawn_count() ).unwrap();

        for _ in 0..5 {
            player.seek( 1.0 );
        }
        let now = Instant::now();

        player.run_timers( now + Duration::from_millis( 100 ) );
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( spawns ) );

        player.run_timers( now + Duration::from_millis( 600 ) );
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( spawns + 1 ) );
        assert_eq!( player.backend().map( |b| b.offset() ), Some( 45.0 ) );
        assert_eq!( player.state(), PlaybackState::Playing );

        player.run_timers( now + Duration::from_millis( 900 ) );
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( spawns + 1 ) );
    }


    #[test]
    fn test_seek_without_entry_is_noop() {
        let mut player = player( &[ "a.ogg" ] );
        player.seek( 1.0 );
        player.jump( 10.0 );
        assert_eq!( player.state(), PlaybackState::Uninitialized );
        assert_eq!( player.next_wait( Instant::now() ), None );
    }


    #[test]
    fn test_next_prev_sets_up_immediately_and_plays_later() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );

        let id = player.next_prev( Direction::Forward );
        assert_eq!( id, Some( entry( &player, 0 ).id ) );
        assert_eq!( player.state(), PlaybackState::Stopped );
        assert_eq!( player.entry().map( |e| e.name.as_str() ), Some( "a.ogg" ) );

        player.next_prev( Direction::Forward );
        player.run_timers( Instant::now() + Duration::from_millis( 600 ) );
        assert_eq!( player.entry().map( |e| e.name.as_str() ), Some( "b.ogg" ) );
        assert_eq!( player.state(), PlaybackState::Playing );
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( 1 ) );
    }


    #[test]
    fn test_unplayable_entry_is_skipped_later() {
        let mut player = player( &[ "a.wav", "b.ogg" ] );

        assert!( !player.play_index( 0 ) );
        assert_eq!( player.status().text(), "Backend not found!" );

        player.run_timers( Instant::now() + Duration::from_millis( 1100 ) );
        assert_eq!( player.playlist().active().map( |e| e.name.as_str() ), Some( "b.ogg" ) );

        player.run_timers( Instant::now() + Duration::from_millis( 1700 ) );
        assert_eq!( player.state(), PlaybackState::Playing );
    }


    #[test]
    fn test_user_next_cancels_pending_skip() {
        let mut player = player( &[ "a.wav", "b.ogg", "c.ogg" ] );

        assert!( !player.play_index( 0 ) );
        let second = entry( &player, 1 ).id;
        assert_eq!( player.next_prev( Direction::Forward ), Some( second ) );

        player.run_timers( Instant::now() + Duration::from_millis( 1500 ) );
        assert_eq!( player.playlist().active().map( |e| e.name.as_str() ), Some( "b.ogg" ) );
    }


    #[test]
    fn test_stop_cancels_pending_skip() {
        let mut player = player( &[ "a.wav", "b.ogg" ] );

        assert!( !player.play_index( 0 ) );
        player.stop( false );

        player.run_timers( Instant::now() + Duration::from_millis( 1500 ) );
        assert_eq!( player.playlist().active().map( |e| e.name.as_str() ), Some( "a.wav" ) );
    }


    #[test]
    fn test_finished_track_advances() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );
        assert!( player.play_index( 0 ) );

        let second = entry( &player, 1 ).id;
        let completion = wait_for( &mut player, |c| c != Completion::Idle );
        assert_eq!( completion, Completion::Advanced( second ) );
        assert_eq!( player.playlist().active().map( |e| e.id ), Some( second ) );
    }


    #[test]
    fn test_finished_last_track_exhausts() {
        let mut player = player( &[ "a.ogg" ] );
        player.play_index( 0 );

        assert_eq!( wait_for( &mut player, |c| c != Completion::Idle ), Completion::Exhausted );
        assert_eq!( player.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_stop_after_halts() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );
        player.playlist_mut().toggle_stop();
        player.play_index( 0 );

        assert_eq!( wait_for( &mut player, |c| c != Completion::Idle ), Completion::Halted );
        assert_eq!( player.state(), PlaybackState::Finished );
        assert_eq!( player.check_finished( Instant::now() ), Completion::Idle );
    }


    #[test]
    fn test_user_stop_does_not_advance() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );
        let e = entry( &player, 0 );
        player.play( &e, 30.0 );
        player.stop( false );

        assert_eq!( player.check_finished( Instant::now() ), Completion::Idle );
        assert_eq!( player.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_watchdog_skips_silent_player() {
        let mut playlist = Playlist::new();
        playlist.add( "/music/a.ogg" );
        playlist.add( "/music/b.ogg" );
        let config = PlayerConfig {
            watchdog: Some( Duration::from_millis( 50 ) ),
            ..PlayerConfig::default()
        };
        let mut player = Player::new( sleep_registry(), playlist, config );
        let e = player.playlist().get( 0 ).cloned().unwrap();
        player.playlist_mut().set_active( 0 );
        player.play( &e, 30.0 );

        assert_eq!( player.check_finished( Instant::now() ), Completion::Idle );
        let later = Instant::now() + Duration::from_millis( 100 );
        let second = entry( &player, 1 ).id;
        assert_eq!( player.check_finished( later ), Completion::Advanced( second ) );
    }


    #[test]
    fn test_watchdog_ignores_time_spent_paused() {
        let mut playlist = Playlist::new();
        playlist.add( "/music/a.ogg" );
        playlist.add( "/music/b.ogg" );
        let config = PlayerConfig {
            watchdog: Some( Duration::from_millis( 200 ) ),
            ..PlayerConfig::default()
        };
        let mut player = Player::new( sleep_registry(), playlist, config );
        let e = player.playlist().get( 0 ).cloned().unwrap();
        player.playlist_mut().set_active( 0 );
        player.play( &e, 30.0 );

        player.toggle_pause();
        assert_eq!( player.state(), PlaybackState::Paused );
        std::thread::sleep( Duration::from_millis( 400 ) );
        assert_eq!( player.check_finished( Instant::now() ), Completion::Idle );

        player.toggle_pause();
        assert_eq!( player.state(), PlaybackState::Playing );
        assert_eq!( player.check_finished( Instant::now() ), Completion::Idle );
        assert_eq!( player.playlist().active().map( |e| e.name.as_str() ), Some( "a.ogg" ) );
    }


    #[test]
    fn test_setup_stopped_seeds_position() {
        let mut player = player( &[ "a.ogg" ] );
        let e = entry( &player, 0 );

        assert!( player.setup_stopped( &e, 61.0, 245.0 ) );
        assert_eq!( player.state(), PlaybackState::Stopped );
        assert_eq!( player.position(), Position::new( 61.0, 245.0 ) );
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( 0 ) );
    }


    #[test]
    fn test_toggle_stop_from_finished_restarts_at_zero() {
        let mut player = player( &[ "a.ogg" ] );
        player.playlist_mut().toggle_stop();
        let e = entry( &player, 0 );
        player.play( &e, 0.0 );
        wait_for( &mut player, |c| c == Completion::Halted );

        player.toggle_stop();
        assert_eq!( player.backend().map( |b| b.spawn_count() ), Some( 2 ) );
        assert_eq!( player.backend().map( |b| b.offset() ), Some( 0.0 ) );
    }


    #[test]
    fn test_status_message_expires() {
        let mut player = player( &[ "a.ogg" ] );
        player.volume( VolumeAction::Set, 50 );
        assert_eq!( player.status().text(), "No mixer." );

        player.run_timers( Instant::now() + Duration::from_secs( 3 ) );
        assert_eq!( player.status().text(), "" );
    }


    struct Recording {
        level: u8,
    }


    impl Mixer for Recording {
        fn name( &self ) -> &str {
            "Test"
        }


        fn volume( &mut self ) -> Result<u8, MixerError> {
            Ok( self.level )
        }


        fn set_volume( &mut self, level: u8 ) -> Result<(), MixerError> {
            self.level = level;
            Ok(())
        }
    }


    #[test]
    fn test_key_volume_uses_mixer() {
        let mut player = player( &[] );
        player.set_mixer( Box::new( Recording { level: 0 } ) );

        player.key_volume( 9 );
        assert_eq!( player.status().text(), "Test volume 100%" );
        player.key_volume( 4 );
        assert_eq!( player.status().text(), "Test volume 44%" );
        player.volume( VolumeAction::Cue, -10 );
        assert_eq!( player.status().text(), "Test volume 34%" );
    }


    #[test]
    fn test_speed_without_control_channel() {
        let mut player = player( &[ "a.ogg" ] );
        let e = entry( &player, 0 );
        player.setup_backend( &e, 0.0 );
        player.change_speed( SPEED_STEP );
        assert_eq!( player.status().text(), "Speed control requires a controllable player" );
    }


    #[test]
    fn test_execute_remote_commands() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );

        assert!( player.execute( &RemoteCommand::Next ) );
        assert_eq!( player.playlist().active().map( |e| e.name.as_str() ), Some( "a.ogg" ) );

        assert!( player.execute( &RemoteCommand::Empty ) );
        assert!( player.playlist().is_empty() );

        assert!( !player.execute( &RemoteCommand::Quit ) );
    }


    #[test]
    fn test_resume_round_trip() {
        let mut player = player( &[ "a.ogg", "b.ogg" ] );
        player.playlist_mut().toggle_repeat();
        player.playlist_mut().set_active( 1 );
        let e = entry( &player, 1 );
        player.setup_stopped( &e, 12.0, 100.0 );
        let state = player.resume_state();

        let mut restored = self::player( &[] );
        restored.restore( state.clone() );

        assert_eq!( restored.playlist().len(), 2 );
        assert!( restored.playlist().repeat() );
        assert_eq!( restored.entry().map( |e| e.id ), state.entry );
        assert_eq!( restored.position(), Position::new( 12.0, 100.0 ) );
        assert_eq!( restored.state(), PlaybackState::Stopped );
    }
}
