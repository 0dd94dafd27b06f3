//! Status line text.
//!
//! A default message describes the playback state; a transient message
//! overrides it until its clear timeout fires.

use crate::timeout::TimeoutId;


#[derive( Debug, Default, Clone )]
pub struct Status {
    default: String,
    message: Option<String>,
    clear: Option<TimeoutId>,
}


impl Status {
    pub fn new() -> Self {
        Self::default()
    }


    /// Text to display right now.
    pub fn text( &self ) -> &str {
        self.message.as_deref().unwrap_or( &self.default )
    }


    pub fn default_text( &self ) -> &str {
        &self.default
    }


    pub fn message( &self ) -> Option<&str> {
        self.message.as_deref()
    }


    pub fn set_default( &mut self, text: impl Into<String> ) {
        self.default = text.into();
    }


    /// Shows a transient message cleared by the timeout `clear`.
    ///
    /// @returns The clear timeout of the message being replaced, which the
    /// caller must cancel
    pub fn set_message( &mut self, text: impl Into<String>, clear: TimeoutId ) -> Option<TimeoutId> {
        self.message = Some( text.into() );
        self.clear.replace( clear )
    }


    /// Drops the transient message.
    pub fn clear_message( &mut self ) {
        self.message = None;
        self.clear = None;
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::timeout::TimeoutQueue;


    #[test]
    fn test_message_overrides_default() {
        let mut queue = TimeoutQueue::new();
        let mut status = Status::new();
        status.set_default( "Playing: a.ogg" );
        assert_eq!( status.text(), "Playing: a.ogg" );

        let first = queue.add( std::time::Duration::from_secs( 1 ), () );
        assert_eq!( status.set_message( "Volume 50%", first ), None );
        assert_eq!( status.text(), "Volume 50%" );

        let second = queue.add( std::time::Duration::from_secs( 1 ), () );
        assert_eq!( status.set_message( "Volume 60%", second ), Some( first ) );

        status.clear_message();
        assert_eq!( status.text(), "Playing: a.ogg" );
    }
}
