//! View state for the TUI.
//!
//! Which list is visible and how the counter shows time.


/// The list occupying the main area.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum Tab {
    FileList,

    #[default]
    Playlist,

    /// Help screen; Tab or Esc returns to the previous list.
    Help,
}


impl Tab {
    /// Next list in tab order; help has no place in the cycle.
    pub fn next( self ) -> Self {
        match self {
            Tab::FileList => Tab::Playlist,
            Tab::Playlist | Tab::Help => Tab::FileList,
        }
    }


    pub fn title( self ) -> &'static str {
        match self {
            Tab::FileList => "Filelist",
            Tab::Playlist => "Playlist",
            Tab::Help => "Help",
        }
    }
}


/// What the counter shows.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum CounterMode {
    #[default]
    Elapsed,
    Remaining,
}


impl CounterMode {
    pub fn toggle( self ) -> Self {
        match self {
            CounterMode::Elapsed => CounterMode::Remaining,
            CounterMode::Remaining => CounterMode::Elapsed,
        }
    }


    /// Counter text for a position, e.g. `01:05 / 04:00` or `-02:55 / 04:00`.
    pub fn format( self, elapsed: f64, total: f64 ) -> String {
        match self {
            CounterMode::Elapsed => format!( "{} / {}", format_time( elapsed ), format_time( total ) ),
            CounterMode::Remaining => {
                format!( "-{} / {}", format_time( ( total - elapsed ).max( 0.0 ) ), format_time( total ) )
            }
        }
    }
}


/// Formats seconds as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_time( seconds: f64 ) -> String {
    let secs = seconds.max( 0.0 ) as u64;
    if secs >= 3600 {
        format!( "{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60 )
    } else {
        format!( "{:02}:{:02}", secs / 60, secs % 60 )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_format_time() {
        assert_eq!( format_time( 0.0 ), "00:00" );
        assert_eq!( format_time( 65.9 ), "01:05" );
        assert_eq!( format_time( 3725.0 ), "1:02:05" );
        assert_eq!( format_time( -3.0 ), "00:00" );
    }


    #[test]
    fn test_counter_modes() {
        assert_eq!( CounterMode::Elapsed.format( 65.0, 240.0 ), "01:05 / 04:00" );
        assert_eq!( CounterMode::Remaining.format( 65.0, 240.0 ), "-02:55 / 04:00" );
        assert_eq!( CounterMode::Elapsed.toggle(), CounterMode::Remaining );
    }


    #[test]
    fn test_tab_cycle() {
        assert_eq!( Tab::Playlist.next(), Tab::FileList );
        assert_eq!( Tab::FileList.next(), Tab::Playlist );
        assert_eq!( Tab::Help.next(), Tab::FileList );
    }
}
