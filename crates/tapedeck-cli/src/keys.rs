//! Key normalization and keymap layout.
//!
//! Terminal events are reduced to a small [`Key`] type so they can index
//! the core keymap tables. The stack is laid out as
//! `[global, tab, list, (prompt)]`; the list level is swapped when the
//! visible list changes and the prompt level exists only while typing.

use crossterm::event::{ KeyCode, KeyEvent, KeyModifiers };

use tapedeck_core::Keymap;


/// Stack level of the visible list's keymap.
pub const LIST_LEVEL: usize = 2;


/// A normalized key press.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum Key {
    Char( char ),
    Ctrl( char ),
    Enter,
    Tab,
    Backspace,
    Delete,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}


impl Key {
    /// Converts a terminal key event, dropping keys nothing binds.
    pub fn from_event( event: KeyEvent ) -> Option<Self> {
        let key = match event.code {
            KeyCode::Char( c ) if event.modifiers.contains( KeyModifiers::CONTROL ) => Key::Ctrl( c.to_ascii_lowercase() ),
            KeyCode::Char( c ) => Key::Char( c ),
            KeyCode::Enter => Key::Enter,
            KeyCode::Tab => Key::Tab,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Esc => Key::Esc,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            _ => return None,
        };
        Some( key )
    }
}


/// Everything a key can trigger.
#[derive( Debug, Clone, Copy, PartialEq )]
pub enum Action {
    // Global
    Seek( f64 ),
    JumpStart,
    JumpEnd,
    Volume( u32 ),
    VolumeCue( i32 ),
    ToggleMixer,
    Next,
    Prev,
    Pause,
    Stop,
    ToggleCounter,
    Speed( f64 ),
    SpeedReset,
    Quit,
    ConfirmQuit,

    // Tab
    SwitchTab,
    Help,

    // Any list
    CursorUp,
    CursorDown,
    PageUp,
    PageDown,
    CursorHome,
    CursorEnd,
    ToggleTag,

    // Playlist
    PlaySelected,
    Delete,
    DeleteAll,
    MoveTagged { after: bool },
    Shuffle,
    Sort,
    ToggleRepeat,
    ToggleRandom,
    ToggleStopAfter,
    JumpToActive,
    TagPrompt,
    UntagPrompt,
    InvertTags,

    // File list
    Open,
    Parent,
    AddSelected,
    FilterPrompt,

    // Help
    CloseHelp,

    // Prompt
    PromptInsert( char ),
    PromptBackspace,
    PromptDelete,
    PromptLeft,
    PromptRight,
    PromptHome,
    PromptEnd,
    PromptSubmit,
    PromptCancel,
}


fn volume_digit( key: Key ) -> Action {
    match key {
        Key::Char( c ) => Action::Volume( c.to_digit( 10 ).unwrap_or( 0 ) ),
        _ => Action::Volume( 0 ),
    }
}


fn printable( key: Key ) -> Option<Action> {
    match key {
        Key::Char( c ) if !c.is_control() => Some( Action::PromptInsert( c ) ),
        _ => None,
    }
}


/// Playback keys, active in every context.
pub fn global_keymap() -> Keymap<Key, Action> {
    let mut map = Keymap::new( "global" );
    map.bind_all( [ Key::Right, Key::Ctrl( 'f' ) ], Action::Seek( 1.0 ) )
        .bind_all( [ Key::Left, Key::Ctrl( 'b' ) ], Action::Seek( -1.0 ) )
        .bind_all( [ Key::Char( '^' ), Key::Ctrl( 'a' ) ], Action::JumpStart )
        .bind_all( [ Key::Char( '$' ), Key::Ctrl( 'e' ) ], Action::JumpEnd )
        .bind_with_key( ( '0'..='9' ).map( Key::Char ), volume_digit )
        .bind( Key::Char( '+' ), Action::VolumeCue( 3 ) )
        .bind( Key::Char( '-' ), Action::VolumeCue( -3 ) )
        .bind( Key::Char( 'v' ), Action::ToggleMixer )
        .bind( Key::Char( 'n' ), Action::Next )
        .bind( Key::Char( 'p' ), Action::Prev )
        .bind( Key::Char( 'z' ), Action::Pause )
        .bind( Key::Char( 'x' ), Action::Stop )
        .bind( Key::Char( 'c' ), Action::ToggleCounter )
        .bind( Key::Char( '}' ), Action::Speed( tapedeck_core::player::SPEED_STEP ) )
        .bind( Key::Char( '{' ), Action::Speed( -tapedeck_core::player::SPEED_STEP ) )
        .bind( Key::Char( '|' ), Action::SpeedReset )
        .bind( Key::Char( 'Q' ), Action::Quit )
        .bind( Key::Char( 'q' ), Action::ConfirmQuit );
    map
}


/// View switching.
pub fn tab_keymap() -> Keymap<Key, Action> {
    let mut map = Keymap::new( "tab" );
    map.bind( Key::Tab, Action::SwitchTab )
        .bind_all( [ Key::Char( 'h' ), Key::Char( '?' ) ], Action::Help );
    map
}


fn bind_cursor( map: &mut Keymap<Key, Action> ) {
    map.bind_all( [ Key::Up, Key::Char( 'k' ), Key::Ctrl( 'p' ) ], Action::CursorUp )
        .bind_all( [ Key::Down, Key::Char( 'j' ), Key::Ctrl( 'n' ) ], Action::CursorDown )
        .bind( Key::PageUp, Action::PageUp )
        .bind( Key::PageDown, Action::PageDown )
        .bind_all( [ Key::Home, Key::Char( 'g' ) ], Action::CursorHome )
        .bind_all( [ Key::End, Key::Char( 'G' ) ], Action::CursorEnd );
}


/// Playlist editing and playback selection.
///
/// In restricted mode only navigation, play and the mode toggles remain.
pub fn playlist_keymap( restricted: bool ) -> Keymap<Key, Action> {
    let mut map = Keymap::new( "playlist" );
    bind_cursor( &mut map );
    map.bind( Key::Enter, Action::PlaySelected )
        .bind( Key::Char( 'r' ), Action::ToggleRepeat )
        .bind( Key::Char( 'R' ), Action::ToggleRandom )
        .bind( Key::Char( 'X' ), Action::ToggleStopAfter )
        .bind( Key::Char( '@' ), Action::JumpToActive )
        .bind( Key::Char( ' ' ), Action::ToggleTag )
        .bind( Key::Char( 't' ), Action::TagPrompt )
        .bind( Key::Char( 'u' ), Action::UntagPrompt )
        .bind( Key::Char( 'i' ), Action::InvertTags );
    if !restricted {
        map.bind_all( [ Key::Char( 'd' ), Key::Delete ], Action::Delete )
            .bind( Key::Char( 'D' ), Action::DeleteAll )
            .bind( Key::Char( 'm' ), Action::MoveTagged { after: true } )
            .bind( Key::Char( 'M' ), Action::MoveTagged { after: false } )
            .bind( Key::Char( 's' ), Action::Shuffle )
            .bind( Key::Char( 'S' ), Action::Sort );
    }
    map
}


/// Directory navigation.
pub fn filelist_keymap( restricted: bool ) -> Keymap<Key, Action> {
    let mut map = Keymap::new( "filelist" );
    bind_cursor( &mut map );
    map.bind( Key::Enter, Action::Open )
        .bind( Key::Backspace, Action::Parent )
        .bind( Key::Char( ' ' ), Action::ToggleTag )
        .bind( Key::Char( '/' ), Action::FilterPrompt );
    if !restricted {
        map.bind( Key::Char( 'a' ), Action::AddSelected );
    }
    map
}


/// Help screen; any of its keys closes it.
pub fn help_keymap() -> Keymap<Key, Action> {
    let mut map = Keymap::new( "help" );
    map.bind_all( [ Key::Up, Key::Char( 'k' ) ], Action::CursorUp )
        .bind_all( [ Key::Down, Key::Char( 'j' ) ], Action::CursorDown )
        .bind_all( [ Key::Esc, Key::Char( 'h' ), Key::Char( '?' ), Key::Tab ], Action::CloseHelp );
    map
}


/// Text prompt; claims every printable key.
pub fn prompt_keymap() -> Keymap<Key, Action> {
    let mut map = Keymap::new( "prompt" );
    map.bind( Key::Enter, Action::PromptSubmit )
        .bind_all( [ Key::Esc, Key::Ctrl( 'g' ), Key::Ctrl( 'c' ) ], Action::PromptCancel )
        .bind( Key::Backspace, Action::PromptBackspace )
        .bind_all( [ Key::Delete, Key::Ctrl( 'd' ) ], Action::PromptDelete )
        .bind( Key::Left, Action::PromptLeft )
        .bind( Key::Right, Action::PromptRight )
        .bind_all( [ Key::Home, Key::Ctrl( 'a' ) ], Action::PromptHome )
        .bind_all( [ Key::End, Key::Ctrl( 'e' ) ], Action::PromptEnd )
        .set_fallback( printable );
    map
}


/// Help screen text.
pub fn help_text() -> &'static str {
    r#"Global
  Left/Right, C-b/C-f   Seek backward / forward
  ^ / $                 Jump to start / end of track
  0..9                  Set volume
  + / -                 Change volume
  v                     Switch mixer channel
  n / p                 Next / previous track
  z                     Toggle pause
  x                     Toggle stop
  c                     Toggle elapsed / remaining counter
  { / } / |             Slower / faster / normal speed
  q / Q                 Quit (with / without asking)

Views
  Tab                   Switch file list / playlist
  h, ?                  Help

Lists
  Up/Down, j/k          Move cursor
  PgUp/PgDn, g/G        Page, first, last
  Space                 Tag / untag

Playlist
  Enter                 Play entry
  d / D                 Delete tagged or current / delete all
  m / M                 Move tagged after / before cursor
  s / S                 Shuffle / sort
  r / R                 Toggle repeat / random
  X                     Stop after current track
  @                     Jump to active entry
  t / u                 Tag / untag by regex
  i                     Invert tags

File list
  Enter                 Enter directory or add and play file
  Backspace             Parent directory
  a                     Add tagged or current to playlist
  /                     Filter"#
}


#[cfg( test )]
mod tests {
    use super::*;
    use tapedeck_core::KeymapStack;


    fn stack( list: Keymap<Key, Action> ) -> KeymapStack<Key, Action> {
        let mut stack = KeymapStack::new();
        stack.push( global_keymap() );
        stack.push( tab_keymap() );
        stack.push( list );
        stack
    }


    #[test]
    fn test_from_event() {
        let ctrl_f = KeyEvent::new( KeyCode::Char( 'f' ), KeyModifiers::CONTROL );
        assert_eq!( Key::from_event( ctrl_f ), Some( Key::Ctrl( 'f' ) ) );

        let upper = KeyEvent::new( KeyCode::Char( 'Q' ), KeyModifiers::SHIFT );
        assert_eq!( Key::from_event( upper ), Some( Key::Char( 'Q' ) ) );

        let f1 = KeyEvent::new( KeyCode::F( 1 ), KeyModifiers::NONE );
        assert_eq!( Key::from_event( f1 ), None );
    }


    #[test]
    fn test_digits_set_volume() {
        let stack = stack( playlist_keymap( false ) );
        assert_eq!( stack.process( Key::Char( '7' ) ), Some( Action::Volume( 7 ) ) );
        assert_eq!( stack.process( Key::Char( '0' ) ), Some( Action::Volume( 0 ) ) );
    }


    #[test]
    fn test_list_level_decides() {
        let mut stack = stack( playlist_keymap( false ) );
        assert_eq!( stack.process( Key::Enter ), Some( Action::PlaySelected ) );
        assert_eq!( stack.process( Key::Char( 'n' ) ), Some( Action::Next ) );

        stack.replace( LIST_LEVEL, filelist_keymap( false ) );
        assert_eq!( stack.process( Key::Enter ), Some( Action::Open ) );
        assert_eq!( stack.process( Key::Char( 'd' ) ), None );
    }


    #[test]
    fn test_prompt_consumes_printable_keys() {
        let mut stack = stack( playlist_keymap( false ) );
        stack.push( prompt_keymap() );

        assert_eq!( stack.process( Key::Char( 'q' ) ), Some( Action::PromptInsert( 'q' ) ) );
        assert_eq!( stack.process( Key::Char( '5' ) ), Some( Action::PromptInsert( '5' ) ) );
        assert_eq!( stack.process( Key::Enter ), Some( Action::PromptSubmit ) );
        assert_eq!( stack.process( Key::Up ), Some( Action::CursorUp ) );

        stack.pop();
        assert_eq!( stack.process( Key::Char( 'q' ) ), Some( Action::ConfirmQuit ) );
    }


    #[test]
    fn test_restricted_playlist_drops_editing() {
        let stack = stack( playlist_keymap( true ) );
        assert_eq!( stack.process( Key::Char( 'd' ) ), None );
        assert_eq!( stack.process( Key::Char( 's' ) ), None );
        assert_eq!( stack.process( Key::Char( 'r' ) ), Some( Action::ToggleRepeat ) );
    }
}
