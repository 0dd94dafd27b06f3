//! System mixers driven through their command-line tools.
//!
//! PulseAudio is tried first through `pactl`, then ALSA through `amixer`.

use std::process::{ Command, Stdio };

use regex::Regex;

use tapedeck_core::backend::which;
use tapedeck_core::{ Mixer, MixerError };


fn run( program: &str, args: &[ &str ] ) -> Result<String, MixerError> {
    let output = Command::new( program )
        .args( args )
        .stdin( Stdio::null() )
        .stderr( Stdio::null() )
        .output()?;
    if !output.status.success() {
        return Err( MixerError::Parse( format!( "{} exited with {}", program, output.status ) ) );
    }
    Ok( String::from_utf8_lossy( &output.stdout ).into_owned() )
}


fn first_percent( pattern: &Regex, text: &str ) -> Result<u8, MixerError> {
    pattern
        .captures( text )
        .and_then( |c| c.get( 1 ) )
        .and_then( |m| m.as_str().parse::<u32>().ok() )
        .map( |v| v.min( 100 ) as u8 )
        .ok_or_else( || MixerError::Parse( text.lines().next().unwrap_or( "" ).to_string() ) )
}


/// ALSA simple controls, rotating between the available channels.
pub struct AlsaMixer {
    channels: Vec<String>,
    percent: Regex,
}


impl AlsaMixer {
    /// Returns a mixer over `Master` and `PCM`, whichever exist.
    pub fn detect() -> Option<Self> {
        which( "amixer" )?;
        let controls = run( "amixer", &[ "scontrols" ] ).ok()?;
        let channels: Vec<String> = [ "Master", "PCM" ]
            .iter()
            .filter( |name| controls.contains( &format!( "'{}'", name ) ) )
            .map( |name| name.to_string() )
            .collect();
        if channels.is_empty() {
            return None;
        }
        let percent = Regex::new( r"\[(\d+)%\]" ).ok()?;
        Some( Self { channels, percent } )
    }


    fn channel( &self ) -> &str {
        self.channels.first().map( String::as_str ).unwrap_or( "Master" )
    }
}


impl Mixer for AlsaMixer {
    fn name( &self ) -> &str {
        self.channel()
    }


    fn volume( &mut self ) -> Result<u8, MixerError> {
        let output = run( "amixer", &[ "get", self.channel() ] )?;
        first_percent( &self.percent, &output )
    }


    fn set_volume( &mut self, level: u8 ) -> Result<(), MixerError> {
        run( "amixer", &[ "-q", "set", self.channel(), &format!( "{}%", level.min( 100 ) ) ] )?;
        Ok(())
    }


    fn toggle( &mut self ) -> Result<(), MixerError> {
        if self.channels.len() < 2 {
            return Err( MixerError::Unsupported );
        }
        self.channels.rotate_left( 1 );
        Ok(())
    }
}


/// The first PulseAudio sink.
pub struct PulseMixer {
    sink: String,
    percent: Regex,
}


impl PulseMixer {
    pub fn detect() -> Option<Self> {
        which( "pactl" )?;
        let sinks = run( "pactl", &[ "list", "sinks" ] ).ok()?;
        let sink = Regex::new( r"Sink #(\d+)" ).ok()?.captures( &sinks )?.get( 1 )?.as_str().to_string();
        let percent = Regex::new( r"Volume: .*? (\d+)%" ).ok()?;
        Some( Self { sink, percent } )
    }
}


impl Mixer for PulseMixer {
    fn name( &self ) -> &str {
        "Master"
    }


    fn volume( &mut self ) -> Result<u8, MixerError> {
        let sinks = run( "pactl", &[ "list", "sinks" ] )?;
        let section = sinks
            .split( "Sink #" )
            .find( |s| s.split_whitespace().next() == Some( self.sink.as_str() ) )
            .unwrap_or( &sinks );
        first_percent( &self.percent, section )
    }


    fn set_volume( &mut self, level: u8 ) -> Result<(), MixerError> {
        run( "pactl", &[ "--", "set-sink-volume", &self.sink, &format!( "{}%", level.min( 100 ) ) ] )?;
        Ok(())
    }
}


/// The first mixer that works on this system.
pub fn detect() -> Option<Box<dyn Mixer>> {
    if let Some( mixer ) = PulseMixer::detect() {
        tracing::info!( "Using PulseAudio mixer" );
        return Some( Box::new( mixer ) );
    }
    if let Some( mixer ) = AlsaMixer::detect() {
        tracing::info!( "Using ALSA mixer" );
        return Some( Box::new( mixer ) );
    }
    tracing::info!( "No mixer found" );
    None
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_first_percent() {
        let alsa = Regex::new( r"\[(\d+)%\]" ).unwrap();
        let output = "Simple mixer control 'Master',0\n  Front Left: Playback 42 [66%] [on]\n  Front Right: Playback 42 [70%] [on]\n";
        assert_eq!( first_percent( &alsa, output ).unwrap(), 66 );
        assert!( matches!( first_percent( &alsa, "garbage" ), Err( MixerError::Parse( _ ) ) ) );

        let pulse = Regex::new( r"Volume: .*? (\d+)%" ).unwrap();
        let output = "\tVolume: front-left: 32768 /  50% / -18.06 dB,   front-right: 32768 /  50% / -18.06 dB\n";
        assert_eq!( first_percent( &pulse, output ).unwrap(), 50 );
    }
}
