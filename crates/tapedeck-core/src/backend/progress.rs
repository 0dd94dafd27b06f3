//! Progress-report parsing
//!
//! Each player family prints its position in its own text format. A
//! [`ProgressParser`] turns one line of that output into an elapsed/total
//! pair in seconds. Parsing is pure: the caller supplies whatever context a
//! format needs (previous position, wall time since spawn).

use std::time::Duration;

use regex::bytes::{ Captures, Regex };
use serde::{ Deserialize, Serialize };


/// Known progress output formats.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "kebab-case" )]
pub enum ProgressFormat {
    /// `Time: 00:13.58 [40:44.43]`: elapsed, then time remaining.
    FrameOffset,

    /// `mm:ss ... mm:ss`: elapsed, then total.
    Mpp,

    /// Bare `h:mm:ss` counting down.
    TimeRemaining,

    /// `00:00:12.63 [00:05:51.84]`: elapsed, then remaining.
    Sox,

    /// `Time: 0:01:47.17 of 0:40:57.82`.
    Gst,

    /// Leading seconds counter, length unknown.
    AvPlay,

    /// mplayer slave-mode status line.
    MPlayer,

    /// No parsable output; position ticks once per poll.
    NoOffset,

    /// No parsable output; position follows the wall clock.
    WallClock,
}


impl ProgressFormat {
    /// Returns true if the position comes from the child's output.
    pub fn reads_output( self ) -> bool {
        !matches!( self, ProgressFormat::NoOffset | ProgressFormat::WallClock )
    }


    /// Returns true if the player can be restarted at an offset.
    pub fn can_seek( self ) -> bool {
        !matches!( self, ProgressFormat::NoOffset )
    }


    fn pattern( self ) -> Option<&'static str> {
        match self {
            ProgressFormat::FrameOffset => Some( r"Time.*\s((\d+:)+\d+).*\[((\d+:)+\d+)" ),
            ProgressFormat::Mpp => Some( r".*\s(\d+):(\d+).*\s(\d+):(\d+)" ),
            ProgressFormat::TimeRemaining => Some( r"(\d+):(\d+):(\d+)" ),
            ProgressFormat::Sox => Some( r"(\d+):(\d+):(\d+)\.\d+ \[(\d+):(\d+):(\d+)\.\d+\]" ),
            ProgressFormat::Gst => Some( r"Time: (\d+):(\d+):(\d+).(\d+) of (\d+):(\d+):(\d+).(\d+)" ),
            ProgressFormat::AvPlay => Some( r"^ *(\d+)\." ),
            ProgressFormat::MPlayer => Some( r"^A:.*?(\d+)\.\d \([^)]+\) of (\d+)\.\d" ),
            ProgressFormat::NoOffset | ProgressFormat::WallClock => None,
        }
    }
}


/// Playback position in seconds.
#[derive( Debug, Clone, Copy, PartialEq, Default )]
pub struct Position {
    pub elapsed: f64,
    pub total: f64,
}


impl Position {
    pub fn new( elapsed: f64, total: f64 ) -> Self {
        Self { elapsed, total }
    }


    /// Seconds left, never negative.
    pub fn remaining( &self ) -> f64 {
        ( self.total - self.elapsed ).max( 0.0 )
    }


    /// Fraction played in `[0, 1]`, or 0 when the length is unknown.
    pub fn fraction( &self ) -> f64 {
        if self.total > 0.0 {
            ( self.elapsed / self.total ).clamp( 0.0, 1.0 )
        } else {
            0.0
        }
    }
}


/// What a parser may need besides the text itself.
#[derive( Debug, Clone, Copy, Default )]
pub struct ProgressContext {
    /// Last known position.
    pub previous: Position,

    /// Offset the child was started at.
    pub spawn_offset: f64,

    /// Wall time since the child was started.
    pub since_spawn: Duration,
}


/// Compiled parser for one progress format.
#[derive( Debug, Clone )]
pub struct ProgressParser {
    format: ProgressFormat,
    pattern: Option<Regex>,
}


impl ProgressParser {
    /// Compiles the pattern for `format`.
    pub fn new( format: ProgressFormat ) -> Result<Self, regex::Error> {
        let pattern = format.pattern().map( Regex::new ).transpose()?;
        Ok( Self { format, pattern } )
    }


    pub fn format( &self ) -> ProgressFormat {
        self.format
    }


    /// Extracts a position from one line of output.
    ///
    /// Returns `None` for text that does not match; the caller keeps its
    /// previous position in that case.
    pub fn parse( &self, line: &[ u8 ], ctx: &ProgressContext ) -> Option<Position> {
        let caps = match &self.pattern {
            Some( pattern ) => Some( pattern.captures( line )? ),
            None => None,
        };

        match ( self.format, caps ) {
            ( ProgressFormat::FrameOffset, Some( c ) ) => {
                let head = clock( c.get( 1 )?.as_bytes() )?;
                let tail = clock( c.get( 3 )?.as_bytes() )?;
                Some( Position::new( head, head + tail ) )
            }
            ( ProgressFormat::Mpp, Some( c ) ) => {
                let head = num( &c, 1 )? * 60.0 + num( &c, 2 )?;
                let total = num( &c, 3 )? * 60.0 + num( &c, 4 )?;
                Some( Position::new( head, total ) )
            }
            ( ProgressFormat::TimeRemaining, Some( c ) ) => {
                let tail = hms( &c, 1 )?;
                let head = ctx.previous.total.max( tail ) - tail;
                Some( Position::new( head, head + tail ) )
            }
            ( ProgressFormat::Sox, Some( c ) ) => {
                let head = hms( &c, 1 )?;
                let tail = hms( &c, 4 )?;
                Some( Position::new( head, head + tail ) )
            }
            ( ProgressFormat::Gst, Some( c ) ) => {
                Some( Position::new( hms( &c, 1 )?, hms( &c, 5 )? ) )
            }
            ( ProgressFormat::AvPlay, Some( c ) ) => {
                let head = num( &c, 1 )?;
                Some( Position::new( head, head * 2.0 ) )
            }
            ( ProgressFormat::MPlayer, Some( c ) ) => {
                Some( Position::new( num( &c, 1 )?, num( &c, 2 )? ) )
            }
            ( ProgressFormat::NoOffset, _ ) => {
                let head = ctx.previous.elapsed + 1.0;
                Some( Position::new( head, head * 2.0 ) )
            }
            ( ProgressFormat::WallClock, _ ) => {
                let head = ctx.spawn_offset + ctx.since_spawn.as_secs_f64();
                Some( Position::new( head, head * 2.0 ) )
            }
            _ => None,
        }
    }
}


fn num( caps: &Captures<'_>, group: usize ) -> Option<f64> {
    let text = std::str::from_utf8( caps.get( group )?.as_bytes() ).ok()?;
    text.parse::<u64>().ok().map( |n| n as f64 )
}


fn hms( caps: &Captures<'_>, first: usize ) -> Option<f64> {
    Some( num( caps, first )? * 3600.0 + num( caps, first + 1 )? * 60.0 + num( caps, first + 2 )? )
}


// "h:m:s" / "m:s" with any number of fields, least significant last.
fn clock( text: &[ u8 ] ) -> Option<f64> {
    let text = std::str::from_utf8( text ).ok()?;
    let mut total = 0.0;
    for ( i, field ) in text.rsplit( ':' ).enumerate() {
        let value: u64 = field.parse().ok()?;
        total += value as f64 * 60f64.powi( i as i32 );
    }
    Some( total )
}


#[cfg( test )]
mod tests {
    use super::*;


    fn parse( format: ProgressFormat, line: &[ u8 ], ctx: ProgressContext ) -> Option<Position> {
        ProgressParser::new( format ).unwrap().parse( line, &ctx )
    }


    #[test]
    fn test_frame_offset() {
        let line = b"Frame#   520 [93576], Time: 00:13.58 [40:44.43], RVA:   off, Vol: 100(100)";
        let pos = parse( ProgressFormat::FrameOffset, line, ProgressContext::default() );
        assert_eq!( pos, Some( Position::new( 13.0, 2457.0 ) ) );
    }


    #[test]
    fn test_time_remaining_uses_previous_length() {
        let ctx = ProgressContext {
            previous: Position::new( 0.0, 2457.0 ),
            ..Default::default()
        };
        let line = b"-00:39:13 Layer III, 320 kbps, 44100 Hz, joint stereo (MS), no CRC";
        assert_eq!( parse( ProgressFormat::TimeRemaining, line, ctx ), Some( Position::new( 104.0, 2457.0 ) ) );
    }


    #[test]
    fn test_time_remaining_without_previous_length() {
        let line = b"-00:02:00";
        assert_eq!(
            parse( ProgressFormat::TimeRemaining, line, ProgressContext::default() ),
            Some( Position::new( 0.0, 120.0 ) )
        );
    }


    #[test]
    fn test_gst() {
        let line = b"Time: 0:01:47.17 of 0:40:57.82";
        assert_eq!( parse( ProgressFormat::Gst, line, ProgressContext::default() ), Some( Position::new( 107.0, 2457.0 ) ) );
    }


    #[test]
    fn test_gst_garbled() {
        assert_eq!( parse( ProgressFormat::Gst, b"Time: 0:01:4", ProgressContext::default() ), None );
        assert_eq!( parse( ProgressFormat::Gst, b"\xff\xfe garbage", ProgressContext::default() ), None );
    }


    #[test]
    fn test_sox() {
        let line = b"In:3.47% 00:00:12.63 [00:05:51.84] Out:557k  [ =====|===== ] Hd:0.0 Clip:0";
        assert_eq!( parse( ProgressFormat::Sox, line, ProgressContext::default() ), Some( Position::new( 12.0, 363.0 ) ) );
    }


    #[test]
    fn test_mpp() {
        let line = b"    0:12.34 / 4:05.00";
        assert_eq!( parse( ProgressFormat::Mpp, line, ProgressContext::default() ), Some( Position::new( 12.0, 245.0 ) ) );
    }


    #[test]
    fn test_avplay_is_anchored() {
        assert_eq!(
            parse( ProgressFormat::AvPlay, b"  42.17 M-A:  0.000 fd=   0", ProgressContext::default() ),
            Some( Position::new( 42.0, 84.0 ) )
        );
        assert_eq!( parse( ProgressFormat::AvPlay, b"Input #0, 42.1", ProgressContext::default() ), None );
    }


    #[test]
    fn test_mplayer() {
        let line = b"A:  61.3 (01:01.2) of 245.0 (04:05.0)  0.4%";
        assert_eq!( parse( ProgressFormat::MPlayer, line, ProgressContext::default() ), Some( Position::new( 61.0, 245.0 ) ) );
    }


    #[test]
    fn test_no_offset_ticks() {
        let pos = parse( ProgressFormat::NoOffset, b"In:3.47% 00:00:12.63 [00:05:51.84]", ProgressContext::default() );
        assert_eq!( pos, Some( Position::new( 1.0, 2.0 ) ) );
    }


    #[test]
    fn test_wall_clock() {
        let ctx = ProgressContext {
            spawn_offset: 30.0,
            since_spawn: Duration::from_secs( 5 ),
            ..Default::default()
        };
        assert_eq!( parse( ProgressFormat::WallClock, b"", ctx ), Some( Position::new( 35.0, 70.0 ) ) );
    }


    #[test]
    fn test_position_helpers() {
        let pos = Position::new( 30.0, 120.0 );
        assert_eq!( pos.remaining(), 90.0 );
        assert_eq!( pos.fraction(), 0.25 );
        assert_eq!( Position::default().fraction(), 0.0 );
    }


    #[test]
    fn test_format_capabilities() {
        assert!( !ProgressFormat::NoOffset.can_seek() );
        assert!( ProgressFormat::WallClock.can_seek() );
        assert!( !ProgressFormat::WallClock.reads_output() );
        assert!( ProgressFormat::Gst.reads_output() );
    }
}
