//! Tapedeck CLI - terminal controller for external players

mod browser;
mod cli;
mod control;
mod input;
mod keys;
mod mixer;
mod settings;
mod signals;
mod view;

use std::fs::{ File, OpenOptions };
use std::io::{ self, BufRead, IsTerminal };
use std::os::unix::io::{ AsRawFd, RawFd };
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, Gauge, List, ListItem, ListState, Paragraph },
};
use regex::RegexBuilder;
use tracing_subscriber::EnvFilter;

use browser::{ FileList, Opened };
use cli::Args;
use control::ControlFifo;
use input::{ Prompt, PromptKind };
use keys::{ Action, Key, LIST_LEVEL };
use settings::Settings;
use view::{ CounterMode, Tab };

use tapedeck_core::{
    command::default_control_path,
    event_loop,
    BackendRegistry, Completion, Direction, KeymapStack, PlaybackState, Player, Playlist, ResumeState,
    VolumeAction,
};


/// Application state.
struct App {
    player: Player,
    keymaps: KeymapStack<Key, Action>,
    should_quit: bool,

    // View state
    tab: Tab,
    return_tab: Tab,
    playlist_state: ListState,
    files: FileList,
    counter: CounterMode,
    help_scroll: u16,
    // Rows of the list area at the last draw, for paging
    page_rows: usize,

    prompt: Option<Prompt>,

    restricted: bool,
    quit_after: bool,
    control: Option<ControlFifo>,
    resume_path: Option<PathBuf>,
}


impl App {
    /// Creates the application from arguments, settings and piped locations.
    fn new( args: &Args, settings: &Settings, piped: Vec<String> ) -> Result<Self> {
        let mut registry = match &settings.backends {
            Some( specs ) => BackendRegistry::new( specs.clone() ).context( "Invalid backend in settings" )?,
            None => BackendRegistry::with_defaults().context( "Invalid built-in backend" )?,
        };
        registry.set_allow_video( args.video );

        let mut player = Player::new( registry, Playlist::new(), settings.player_config() );
        if let Some( mixer ) = mixer::detect() {
            player.set_mixer( mixer );
        }

        let locations: Vec<String> = args.files.iter().cloned().chain( piped ).collect();
        for location in &locations {
            if let Err( e ) = player.add_location( location ) {
                tracing::warn!( "Skipping {}: {}", location, e );
            }
        }

        if locations.is_empty() {
            if let Some( path ) = &args.save {
                match ResumeState::load( path ) {
                    Ok( Some( state ) ) => player.restore( state ),
                    Ok( None ) => {}
                    Err( e ) => tracing::warn!( "Ignoring resume file {:?}: {}", path, e ),
                }
            }
        }
        if args.repeat {
            player.playlist_mut().set_repeat( true );
        }
        if args.random {
            player.playlist_mut().set_random( true );
        }

        let start_dir = std::env::current_dir()
            .ok()
            .or_else( dirs::home_dir )
            .unwrap_or_else( || PathBuf::from( "/" ) );
        let files = FileList::new( start_dir, player.registry() )?;

        let fifo_path = args.fifo.clone().or_else( || settings.fifo.clone() ).unwrap_or_else( default_control_path );
        let control = match ControlFifo::create( &fifo_path ) {
            Ok( fifo ) => Some( fifo ),
            Err( e ) => {
                tracing::warn!( "Remote control disabled: {:#}", e );
                None
            }
        };

        let tab = if player.playlist().is_empty() { Tab::FileList } else { Tab::Playlist };
        let mut keymaps = KeymapStack::new();
        keymaps.push( keys::global_keymap() );
        keymaps.push( keys::tab_keymap() );
        keymaps.push( list_keymap( tab, args.restricted ) );

        let mut playlist_state = ListState::default();
        playlist_state.select( player.playlist().jump_to_active().or( Some( 0 ) ) );

        Ok( Self {
            player,
            keymaps,
            should_quit: false,
            tab,
            return_tab: tab,
            playlist_state,
            files,
            counter: CounterMode::default(),
            help_scroll: 0,
            page_rows: 10,
            prompt: None,
            restricted: args.restricted,
            quit_after: args.quit_after || settings.quit_after_playlist,
            control,
            resume_path: args.save.clone(),
        })
    }


    /// Runs the loop until a quit is requested.
    fn run( &mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>> ) -> Result<()> {
        let tty: RawFd = io::stdin().as_raw_fd();

        while !self.should_quit && !signals::quit_requested() {
            terminal.draw( |frame| draw_ui( frame, self ) )?;

            let mut fds = vec![ tty ];
            fds.extend( self.player.backend_fds() );
            let control_fd = self.control.as_ref().map( |c| c.fd() );
            fds.extend( control_fd );

            let timeout = self.player.next_wait( Instant::now() );
            let ready = event_loop::wait_readable( &fds, timeout )?;

            self.player.run_timers( Instant::now() );
            for fd in ready {
                if fd == tty {
                    self.read_terminal()?;
                } else if Some( fd ) == control_fd {
                    self.read_control();
                } else {
                    self.player.read_backend( fd );
                }
            }

            match self.player.check_finished( Instant::now() ) {
                Completion::Exhausted if self.quit_after => {
                    tracing::info!( "Playlist finished, quitting" );
                    self.should_quit = true;
                }
                Completion::Advanced( _ ) => self.follow_active(),
                _ => {}
            }
        }
        Ok(())
    }


    fn read_terminal( &mut self ) -> Result<()> {
        while event::poll( Duration::ZERO )? {
            if let Event::Key( event ) = event::read()? {
                if event.kind != KeyEventKind::Release {
                    if let Some( key ) = Key::from_event( event ) {
                        self.handle_key( key );
                    }
                }
            }
        }
        Ok(())
    }


    fn read_control( &mut self ) {
        let Some( control ) = self.control.as_mut() else {
            return;
        };
        for command in control.read_commands() {
            match command {
                Ok( command ) => {
                    if !self.player.execute( &command ) {
                        self.should_quit = true;
                    }
                }
                Err( e ) => {
                    tracing::warn!( "Remote: {}", e );
                    self.player.notify( e.to_string() );
                }
            }
        }
        self.clamp_cursor();
    }


    fn handle_key( &mut self, key: Key ) {
        match self.keymaps.process( key ) {
            Some( action ) => self.dispatch( action ),
            None => tracing::trace!( "Unbound key {:?}", key ),
        }
    }


    fn dispatch( &mut self, action: Action ) {
        match action {
            Action::Seek( direction ) => self.player.seek( direction ),
            Action::JumpStart => self.player.jump( 0.0 ),
            Action::JumpEnd => self.player.jump( -1.0 ),
            Action::Volume( digit ) => self.player.key_volume( digit ),
            Action::VolumeCue( delta ) => self.player.volume( VolumeAction::Cue, delta ),
            Action::ToggleMixer => self.player.toggle_mixer(),
            Action::Next => self.step( Direction::Forward ),
            Action::Prev => self.step( Direction::Backward ),
            Action::Pause => self.player.toggle_pause(),
            Action::Stop => self.player.toggle_stop(),
            Action::ToggleCounter => self.counter = self.counter.toggle(),
            Action::Speed( delta ) => self.player.change_speed( delta ),
            Action::SpeedReset => self.player.reset_speed(),
            Action::Quit => self.should_quit = true,
            Action::ConfirmQuit => self.open_prompt( PromptKind::ConfirmQuit ),

            Action::SwitchTab => self.set_tab( self.tab.next() ),
            Action::Help => {
                self.return_tab = self.tab;
                self.help_scroll = 0;
                self.set_tab( Tab::Help );
            }
            Action::CloseHelp => self.set_tab( self.return_tab ),

            Action::CursorUp => self.move_cursor( -1 ),
            Action::CursorDown => self.move_cursor( 1 ),
            Action::PageUp => self.move_cursor( -( self.page_rows as isize ) ),
            Action::PageDown => self.move_cursor( self.page_rows as isize ),
            Action::CursorHome => self.cursor_edge( false ),
            Action::CursorEnd => self.cursor_edge( true ),
            Action::ToggleTag => match self.tab {
                Tab::FileList => self.files.toggle_tag(),
                _ => {
                    let cursor = self.cursor();
                    self.player.playlist_mut().toggle_tag( cursor );
                    self.move_cursor( 1 );
                }
            },

            Action::PlaySelected => {
                let index = self.cursor();
                self.player.play_index( index );
            }
            Action::Delete => {
                let cursor = self.cursor();
                let removed = self.player.playlist_mut().delete( cursor );
                self.player.notify( format!( "Deleted {} entries", removed ) );
                self.clamp_cursor();
            }
            Action::DeleteAll => {
                self.player.playlist_mut().clear();
                self.clamp_cursor();
            }
            Action::MoveTagged { after } => {
                let cursor = self.cursor();
                if let Some( index ) = self.player.playlist_mut().move_tagged( cursor, after ) {
                    self.playlist_state.select( Some( index ) );
                }
            }
            Action::Shuffle => {
                self.player.playlist_mut().shuffle();
                self.player.notify( "Shuffled" );
            }
            Action::Sort => {
                self.player.playlist_mut().sort();
                self.player.notify( "Sorted" );
            }
            Action::ToggleRepeat => {
                let on = self.player.playlist_mut().toggle_repeat();
                self.player.notify( format!( "Repeat: {}", on_off( on ) ) );
            }
            Action::ToggleRandom => {
                let on = self.player.playlist_mut().toggle_random();
                self.player.notify( format!( "Random: {}", on_off( on ) ) );
            }
            Action::ToggleStopAfter => {
                let on = self.player.playlist_mut().toggle_stop();
                self.player.notify( format!( "Stop after this track: {}", on_off( on ) ) );
            }
            Action::JumpToActive => self.follow_active(),
            Action::TagPrompt => self.open_prompt( PromptKind::Tag ),
            Action::UntagPrompt => self.open_prompt( PromptKind::Untag ),
            Action::InvertTags => self.player.playlist_mut().invert_tags(),

            Action::Open => self.open_file(),
            Action::Parent => {
                if let Err( e ) = self.files.go_up( self.player.registry() ) {
                    self.player.notify( e.to_string() );
                }
            }
            Action::AddSelected => self.add_selection(),
            Action::FilterPrompt => self.open_prompt( PromptKind::Filter ),

            Action::PromptInsert( c ) => self.edit_prompt( |p| p.insert( c ) ),
            Action::PromptBackspace => self.edit_prompt( Prompt::backspace ),
            Action::PromptDelete => self.edit_prompt( Prompt::delete ),
            Action::PromptLeft => self.edit_prompt( Prompt::left ),
            Action::PromptRight => self.edit_prompt( Prompt::right ),
            Action::PromptHome => self.edit_prompt( Prompt::home ),
            Action::PromptEnd => self.edit_prompt( Prompt::end ),
            Action::PromptSubmit => self.submit_prompt(),
            Action::PromptCancel => self.close_prompt(),
        }
    }


    fn step( &mut self, direction: Direction ) {
        if self.player.next_prev( direction ).is_some() {
            self.follow_active();
        }
    }


    fn set_tab( &mut self, tab: Tab ) {
        self.tab = tab;
        self.keymaps.replace( LIST_LEVEL, list_keymap( tab, self.restricted ) );
    }


    fn cursor( &self ) -> usize {
        self.playlist_state.selected().unwrap_or( 0 )
    }


    fn move_cursor( &mut self, delta: isize ) {
        match self.tab {
            Tab::FileList => self.files.move_cursor( delta ),
            Tab::Playlist => {
                let last = self.player.playlist().len().saturating_sub( 1 ) as isize;
                let index = ( self.cursor() as isize ).saturating_add( delta ).clamp( 0, last );
                self.playlist_state.select( Some( index as usize ) );
            }
            Tab::Help => {
                let scroll = ( self.help_scroll as isize + delta ).clamp( 0, u16::MAX as isize );
                self.help_scroll = scroll as u16;
            }
        }
    }


    fn cursor_edge( &mut self, end: bool ) {
        match ( self.tab, end ) {
            ( Tab::FileList, false ) => self.files.select_first(),
            ( Tab::FileList, true ) => self.files.select_last(),
            ( Tab::Playlist, false ) => self.playlist_state.select( Some( 0 ) ),
            ( Tab::Playlist, true ) => {
                let last = self.player.playlist().len().saturating_sub( 1 );
                self.playlist_state.select( Some( last ) );
            }
            ( Tab::Help, false ) => self.help_scroll = 0,
            ( Tab::Help, true ) => self.help_scroll = u16::MAX,
        }
    }


    fn clamp_cursor( &mut self ) {
        let last = self.player.playlist().len().saturating_sub( 1 );
        let cursor = self.cursor().min( last );
        self.playlist_state.select( Some( cursor ) );
    }


    fn follow_active( &mut self ) {
        if let Some( index ) = self.player.playlist().jump_to_active() {
            self.playlist_state.select( Some( index ) );
        }
    }


    fn open_file( &mut self ) {
        let opened = match self.files.open_selected( self.player.registry() ) {
            Ok( opened ) => opened,
            Err( e ) => {
                self.player.notify( e.to_string() );
                return;
            }
        };
        if let Opened::File( path ) = opened {
            if self.restricted {
                return;
            }
            let before = self.player.playlist().len();
            if let Ok( added ) = self.player.add_location( &path.to_string_lossy() ) {
                if added > 0 {
                    self.player.play_index( before );
                    self.follow_active();
                }
            }
        }
    }


    fn add_selection( &mut self ) {
        let mut total = 0;
        for path in self.files.selection() {
            match self.player.add_location( &path.to_string_lossy() ) {
                Ok( n ) => total += n,
                Err( e ) => tracing::warn!( "Skipping {:?}: {}", path, e ),
            }
        }
        self.files.clear_tags();
        self.player.notify( format!( "Added {} entries", total ) );
    }


    fn open_prompt( &mut self, kind: PromptKind ) {
        if self.prompt.is_none() {
            self.keymaps.push( keys::prompt_keymap() );
        }
        self.prompt = Some( Prompt::new( kind ) );
    }


    fn close_prompt( &mut self ) {
        if self.prompt.take().is_some() {
            self.keymaps.pop();
        }
    }


    fn edit_prompt( &mut self, edit: impl FnOnce( &mut Prompt ) ) {
        if let Some( prompt ) = self.prompt.as_mut() {
            edit( prompt );
        }
    }


    fn submit_prompt( &mut self ) {
        let Some( prompt ) = self.prompt.as_ref() else {
            return;
        };
        let kind = prompt.kind();
        let text = prompt.text().to_string();
        self.close_prompt();

        match kind {
            PromptKind::ConfirmQuit => {
                if text.trim().eq_ignore_ascii_case( "y" ) {
                    self.should_quit = true;
                }
            }
            PromptKind::Filter => self.files.set_filter( text ),
            PromptKind::Tag | PromptKind::Untag => {
                let tagged = kind == PromptKind::Tag;
                match RegexBuilder::new( &text ).case_insensitive( true ).build() {
                    Ok( pattern ) => {
                        let n = self.player.playlist_mut().tag_matching( &pattern, tagged );
                        let verb = if tagged { "Tagged" } else { "Untagged" };
                        self.player.notify( format!( "{} {} entries", verb, n ) );
                    }
                    Err( e ) => self.player.notify( format!( "Invalid regex: {}", e ) ),
                }
            }
        }
    }


    /// Writes the resume file and stops the player.
    fn shutdown( &mut self ) {
        if let Some( path ) = &self.resume_path {
            if let Err( e ) = self.player.resume_state().save( path ) {
                tracing::warn!( "Failed to save resume file: {}", e );
            }
        }
        self.player.shutdown();
        self.control = None;
    }
}


fn list_keymap( tab: Tab, restricted: bool ) -> tapedeck_core::Keymap<Key, Action> {
    match tab {
        Tab::FileList => keys::filelist_keymap( restricted ),
        Tab::Playlist => keys::playlist_keymap( restricted ),
        Tab::Help => keys::help_keymap(),
    }
}


fn on_off( on: bool ) -> &'static str {
    if on { "on" } else { "off" }
}


/// Sends tracing output to `path`; without a path nothing is logged.
fn init_logging( path: Option<&Path> ) -> Result<()> {
    let Some( path ) = path else {
        return Ok(());
    };
    let file = File::create( path ).with_context( || format!( "Cannot open debug log {}", path.display() ) )?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( "debug" ) );
    tracing_subscriber::fmt()
        .with_writer( Mutex::new( file ) )
        .with_ansi( false )
        .with_env_filter( filter )
        .init();
    Ok(())
}


/// Reads locations from piped stdin, then points stdin at the terminal.
fn take_piped_stdin() -> Result<Vec<String>> {
    if io::stdin().is_terminal() {
        return Ok( Vec::new() );
    }
    let locations: Vec<String> = io::stdin()
        .lock()
        .lines()
        .map_while( |line| line.ok() )
        .map( |line| line.trim().to_string() )
        .filter( |line| !line.is_empty() )
        .collect();

    let tty = OpenOptions::new().read( true ).write( true ).open( "/dev/tty" ).context( "Cannot open /dev/tty" )?;
    // SAFETY: both descriptors are valid for the duration of the call.
    if unsafe { libc::dup2( tty.as_raw_fd(), libc::STDIN_FILENO ) } < 0 {
        return Err( io::Error::last_os_error() ).context( "Cannot reattach stdin to the terminal" );
    }
    Ok( locations )
}


fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( args.debug.as_deref() )?;
    let settings = Settings::load();
    if args.write_config {
        settings.save();
        return Ok(());
    }
    let piped = take_piped_stdin()?;
    signals::install();

    let mut app = App::new( &args, &settings, piped )?;

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    let result = Terminal::new( CrosstermBackend::new( io::stdout() ) )
        .map_err( anyhow::Error::from )
        .and_then( |mut terminal| app.run( &mut terminal ) );

    app.shutdown();

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    result
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let chunks = Layout::default()
        .direction( ratatui::layout::Direction::Vertical )
        .constraints([
            Constraint::Length( 1 ),  // Title
            Constraint::Min( 0 ),     // List
            Constraint::Length( 1 ),  // Progress
            Constraint::Length( 1 ),  // Status
        ])
        .split( frame.area() );

    draw_title( frame, app, chunks[0] );
    app.page_rows = chunks[1].height.saturating_sub( 2 ).max( 1 ) as usize;
    match app.tab {
        Tab::FileList => draw_filelist( frame, app, chunks[1] ),
        Tab::Playlist => draw_playlist( frame, app, chunks[1] ),
        Tab::Help => draw_help( frame, app, chunks[1] ),
    }
    draw_progress( frame, app, chunks[2] );
    draw_status_bar( frame, app, chunks[3] );
}


fn draw_title( frame: &mut Frame, app: &App, area: Rect ) {
    let playlist = app.player.playlist();
    let mut flags = String::new();
    if playlist.repeat() {
        flags.push_str( " [repeat]" );
    }
    if playlist.random() {
        flags.push_str( " [random]" );
    }
    if playlist.stop_after() {
        flags.push_str( " [stop]" );
    }
    if app.restricted {
        flags.push_str( " [restricted]" );
    }

    let title = Paragraph::new( format!( " Tapedeck - {}{}", app.tab.title(), flags ) )
        .style( Style::default().fg( Color::Cyan ).bold() );
    frame.render_widget( title, area );
}


fn draw_playlist( frame: &mut Frame, app: &mut App, area: Rect ) {
    let playlist = app.player.playlist();
    let items: Vec<ListItem> = playlist
        .entries()
        .iter()
        .map( |entry| {
            let marker = if entry.active { ">" } else { " " };
            let tag = if entry.tagged { "*" } else { " " };
            let style = if entry.active {
                Style::default().fg( Color::Yellow ).bold()
            } else if entry.tagged {
                Style::default().fg( Color::Magenta )
            } else {
                Style::default()
            };
            ListItem::new( format!( "{}{} {}", marker, tag, entry.name ) ).style( style )
        })
        .collect();

    let title = format!( " Playlist ({}) ", playlist.len() );
    let widget = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) );
    frame.render_stateful_widget( widget, area, &mut app.playlist_state );
}


fn draw_filelist( frame: &mut Frame, app: &mut App, area: Rect ) {
    let path = app.files.current_dir().display().to_string();
    let title = match app.files.filter() {
        "" => format!( " {} ({}) ", path, app.files.len() ),
        filter => format!( " {} [{}] ({}) ", path, filter, app.files.len() ),
    };

    let items: Vec<ListItem> = app
        .files
        .visible_entries()
        .iter()
        .map( |entry| {
            let tag = if entry.tagged { "*" } else { " " };
            let ( name, style ) = if entry.is_dir {
                ( format!( "{}/", entry.name ), Style::default().fg( Color::Blue ) )
            } else if entry.playable {
                ( entry.name.clone(), Style::default().fg( Color::Green ) )
            } else {
                ( entry.name.clone(), Style::default().fg( Color::DarkGray ) )
            };
            ListItem::new( format!( "{} {}", tag, name ) ).style( style )
        })
        .collect();

    let mut state = ListState::default();
    state.select( Some( app.files.selected_index() ) );
    let widget = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) );
    frame.render_stateful_widget( widget, area, &mut state );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let text = keys::help_text();
    let max_scroll = ( text.lines().count() as u16 ).saturating_sub( area.height.saturating_sub( 2 ) );
    app.help_scroll = app.help_scroll.min( max_scroll );

    let help = Paragraph::new( text )
        .block( Block::default().title( " Help (Esc to close) " ).borders( Borders::ALL ) )
        .scroll(( app.help_scroll, 0 ));
    frame.render_widget( help, area );
}


fn draw_progress( frame: &mut Frame, app: &App, area: Rect ) {
    let position = app.player.position();
    let gauge = Gauge::default()
        .gauge_style( Style::default().fg( Color::Cyan ).bg( Color::Black ) )
        .ratio( position.fraction().clamp( 0.0, 1.0 ) )
        .label( "" );
    frame.render_widget( gauge, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let position = app.player.position();
    let counter = match app.player.state() {
        PlaybackState::Uninitialized => String::new(),
        _ => app.counter.format( position.elapsed, position.total ),
    };
    let counter_width = counter.chars().count() as u16 + 1;

    let chunks = Layout::default()
        .direction( ratatui::layout::Direction::Horizontal )
        .constraints([ Constraint::Min( 0 ), Constraint::Length( counter_width ) ])
        .split( area );

    let ( text, style ) = match &app.prompt {
        Some( prompt ) => ( prompt.display(), Style::default().fg( Color::Yellow ) ),
        None => ( app.player.status().text().to_string(), Style::default().fg( Color::Green ) ),
    };
    frame.render_widget( Paragraph::new( text ).style( style ), chunks[0] );
    frame.render_widget( Paragraph::new( counter ).alignment( Alignment::Right ), chunks[1] );

    if let Some( prompt ) = &app.prompt {
        let x = chunks[0].x + ( prompt.cursor_column() as u16 ).min( chunks[0].width.saturating_sub( 1 ) );
        frame.set_cursor_position(( x, chunks[0].y ));
    }
}
