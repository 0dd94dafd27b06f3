//! Deferred single-shot actions ordered by monotonic deadline.
//!
//! The queue stores plain data (`A`) rather than closures: whoever drains it
//! dispatches the actions with full mutable access to its own state, which
//! also lets an action schedule itself again without re-entrancy issues.

use std::time::{ Duration, Instant };


/// Handle returned by [`TimeoutQueue::add`], used to cancel a pending action.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct TimeoutId( u64 );


#[derive( Debug )]
struct Pending<A> {
    id: TimeoutId,
    deadline: Instant,
    action: A,
}


/// Monotonic-time-ordered set of deferred actions.
#[derive( Debug )]
pub struct TimeoutQueue<A> {
    next_id: u64,
    // Sorted by deadline; equal deadlines keep insertion order.
    pending: Vec<Pending<A>>,
}


impl<A> TimeoutQueue<A> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }


    /// Schedules `action` to fire `delay` from now.
    pub fn add( &mut self, delay: Duration, action: A ) -> TimeoutId {
        self.add_at( Instant::now() + delay, action )
    }


    /// Schedules `action` to fire at an absolute deadline.
    pub fn add_at( &mut self, deadline: Instant, action: A ) -> TimeoutId {
        self.next_id += 1;
        let id = TimeoutId( self.next_id );
        let pos = self.pending.partition_point( |p| p.deadline <= deadline );
        self.pending.insert( pos, Pending { id, deadline, action } );
        id
    }


    /// Cancels a pending action, returning it if it had not fired yet.
    pub fn remove( &mut self, id: TimeoutId ) -> Option<A> {
        let pos = self.pending.iter().position( |p| p.id == id )?;
        Some( self.pending.remove( pos ).action )
    }


    /// Returns true if the action is still pending.
    pub fn contains( &self, id: TimeoutId ) -> bool {
        self.pending.iter().any( |p| p.id == id )
    }


    /// Removes and returns every action whose deadline is at or before `now`.
    ///
    /// Actions are detached from the queue before they are handed out, so an
    /// action that re-adds itself cannot fire twice in the same pass.
    pub fn take_due( &mut self, now: Instant ) -> Vec<A> {
        let due = self.pending.partition_point( |p| p.deadline <= now );
        self.pending.drain( ..due ).map( |p| p.action ).collect()
    }


    /// Fires every due action through `fire` and returns the delay until the
    /// next pending deadline, or `None` if nothing is left.
    pub fn check( &mut self, now: Instant, mut fire: impl FnMut( A ) ) -> Option<Duration> {
        for action in self.take_due( now ) {
            fire( action );
        }
        self.next_delay( now )
    }


    /// Delay from `now` until the earliest pending deadline.
    pub fn next_delay( &self, now: Instant ) -> Option<Duration> {
        self.pending
            .first()
            .map( |p| p.deadline.saturating_duration_since( now ) )
    }


    /// Number of pending actions.
    pub fn len( &self ) -> usize {
        self.pending.len()
    }


    /// Returns true if nothing is pending.
    pub fn is_empty( &self ) -> bool {
        self.pending.is_empty()
    }


    /// Drops every pending action.
    pub fn clear( &mut self ) {
        self.pending.clear();
    }
}


impl<A> Default for TimeoutQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_fires_once_after_deadline() {
        let mut queue = TimeoutQueue::new();
        let start = Instant::now();
        queue.add_at( start + Duration::from_secs( 5 ), "foo" );

        let mut fired = Vec::new();
        let next = queue.check( start + Duration::from_secs( 1 ), |a| fired.push( a ) );
        assert!( fired.is_empty() );
        assert_eq!( next, Some( Duration::from_secs( 4 ) ) );

        let next = queue.check( start + Duration::from_secs( 5 ), |a| fired.push( a ) );
        assert_eq!( fired, vec![ "foo" ] );
        assert_eq!( next, None );

        queue.check( start + Duration::from_secs( 10 ), |a| fired.push( a ) );
        assert_eq!( fired, vec![ "foo" ] );
    }


    #[test]
    fn test_add_relative_to_now() {
        let mut queue = TimeoutQueue::new();
        queue.add( Duration::from_secs( 5 ), 1 );

        assert!( queue.take_due( Instant::now() ).is_empty() );
        assert_eq!( queue.take_due( Instant::now() + Duration::from_secs( 5 ) ), vec![ 1 ] );
        assert!( queue.is_empty() );
    }


    #[test]
    fn test_remove_cancels() {
        let mut queue = TimeoutQueue::new();
        let start = Instant::now();
        let id = queue.add_at( start, 'a' );
        queue.add_at( start, 'b' );

        assert_eq!( queue.remove( id ), Some( 'a' ) );
        assert_eq!( queue.remove( id ), None );
        assert!( !queue.contains( id ) );
        assert_eq!( queue.take_due( start ), vec![ 'b' ] );
    }


    #[test]
    fn test_due_actions_come_out_in_deadline_order() {
        let mut queue = TimeoutQueue::new();
        let start = Instant::now();
        queue.add_at( start + Duration::from_millis( 30 ), 3 );
        queue.add_at( start + Duration::from_millis( 10 ), 1 );
        queue.add_at( start + Duration::from_millis( 20 ), 2 );
        queue.add_at( start + Duration::from_millis( 10 ), 11 );

        assert_eq!( queue.take_due( start + Duration::from_millis( 30 ) ), vec![ 1, 11, 2, 3 ] );
    }


    #[test]
    fn test_readding_during_drain_waits_for_next_pass() {
        let mut queue = TimeoutQueue::new();
        let start = Instant::now();
        queue.add_at( start, "poll" );

        for action in queue.take_due( start ) {
            queue.add_at( start, action );
        }

        assert_eq!( queue.len(), 1 );
        assert_eq!( queue.next_delay( start ), Some( Duration::ZERO ) );
    }
}
