//! Command-line argument parsing for Tapedeck.

use std::path::PathBuf;

use clap::Parser;


/// Default resume file name when `--save` is given without a value.
pub const DEFAULT_RESUME_FILE: &str = ".tapedeck.rec";


/// Tapedeck - a terminal front end for external audio players.
#[derive( Parser, Debug, Default )]
#[command( name = "tapedeck" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Write a debug log to this file.
    #[arg( long, value_name = "FILE" )]
    pub debug: Option<PathBuf>,

    /// Restricted mode: no adding, deleting or reordering.
    #[arg( short = 'n', long )]
    pub restricted: bool,

    /// Start with repeat on.
    #[arg( short, long )]
    pub repeat: bool,

    /// Start with random order on.
    #[arg( short = 'R', long )]
    pub random: bool,

    /// Also list and play video files.
    #[arg( short = 'V', long )]
    pub video: bool,

    /// Save and restore the session in a resume file.
    #[arg( short, long, value_name = "FILE", num_args = 0..=1, default_missing_value = DEFAULT_RESUME_FILE )]
    pub save: Option<PathBuf>,

    /// Control FIFO path.
    #[arg( long, value_name = "PATH" )]
    pub fifo: Option<PathBuf>,

    /// Exit once the playlist has been played through.
    #[arg( long )]
    pub quit_after: bool,

    /// Write the settings file, filling in defaults, and exit.
    #[arg( long )]
    pub write_config: bool,

    /// Files, directories or URLs to add to the playlist.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<String>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_flags() {
        let args = Args::try_parse_from( [ "tapedeck", "-r", "-R", "-V", "a.ogg", "dir" ] ).unwrap();
        assert!( args.repeat );
        assert!( args.random );
        assert!( args.video );
        assert!( !args.restricted );
        assert_eq!( args.files, vec![ "a.ogg", "dir" ] );
    }


    #[test]
    fn test_save_without_value_uses_default() {
        let args = Args::try_parse_from( [ "tapedeck", "--save" ] ).unwrap();
        assert_eq!( args.save, Some( PathBuf::from( DEFAULT_RESUME_FILE ) ) );

        let args = Args::try_parse_from( [ "tapedeck", "--save=/tmp/x.rec" ] ).unwrap();
        assert_eq!( args.save, Some( PathBuf::from( "/tmp/x.rec" ) ) );

        let args = Args::try_parse_from( [ "tapedeck" ] ).unwrap();
        assert_eq!( args.save, None );
    }
}
