//! Property-based tests for scheduling and timeouts
//!
//! Uses proptest to check the playlist traversal rules over many list
//! sizes, seeds and step sequences.

use std::collections::HashSet;
use std::time::{ Duration, Instant };

use proptest::prelude::*;
use tapedeck_core::{ Direction, EntryId, Keymap, KeymapStack, Playlist, Scheduler, TimeoutQueue };


fn playlist( len: usize, seed: u64 ) -> Playlist {
    let mut playlist = Playlist::with_scheduler( Scheduler::with_seed( seed ) );
    for i in 0..len {
        playlist.add( format!( "/music/{:03}.ogg", i ) );
    }
    playlist
}


fn step( playlist: &mut Playlist, direction: Direction ) -> Option<EntryId> {
    playlist.advance( direction ).map( |e| e.id )
}


proptest! {
    /// Sequential traversal visits every entry in order, then stops.
    #[test]
    fn sequential_visits_in_order( len in 1usize..40 ) {
        let mut playlist = playlist( len, 0 );
        let expected: Vec<EntryId> = playlist.entries().iter().map( |e| e.id ).collect();

        let mut seen = Vec::new();
        while let Some( id ) = step( &mut playlist, Direction::Forward ) {
            seen.push( id );
            prop_assert!( seen.len() <= len );
        }

        prop_assert_eq!( seen, expected );
        prop_assert_eq!( playlist.active().map( |e| e.id ), playlist.entries().last().map( |e| e.id ) );
    }


    /// With repeat on, N steps in one direction return to the start.
    #[test]
    fn repeat_has_period_n( len in 1usize..40, start in 0usize..40, forward in any::<bool>() ) {
        let mut playlist = playlist( len, 0 );
        playlist.set_repeat( true );
        let start = start % len;
        let first = playlist.set_active( start ).map( |e| e.id );
        let direction = if forward { Direction::Forward } else { Direction::Backward };

        for _ in 0..len {
            prop_assert!( step( &mut playlist, direction ).is_some() );
        }
        prop_assert_eq!( playlist.active().map( |e| e.id ), first );
    }


    /// Random mode without repeat plays each entry exactly once.
    #[test]
    fn random_visits_everything_once( len in 1usize..40, seed in any::<u64>() ) {
        let mut playlist = playlist( len, seed );
        playlist.set_random( true );

        let mut seen = HashSet::new();
        for _ in 0..len {
            let id = step( &mut playlist, Direction::Forward );
            prop_assert!( id.is_some() );
            prop_assert!( seen.insert( id ) );
        }
        prop_assert_eq!( step( &mut playlist, Direction::Forward ), None );
    }


    /// Stepping back retraces the random order exactly, and stepping
    /// forward again replays it.
    #[test]
    fn random_back_is_exact_undo( len in 2usize..30, taken in 2usize..30, seed in any::<u64>() ) {
        let mut playlist = playlist( len, seed );
        playlist.set_random( true );
        let taken = taken.min( len );

        let mut order = Vec::new();
        for _ in 0..taken {
            order.extend( step( &mut playlist, Direction::Forward ) );
        }

        let mut back = Vec::new();
        for _ in 1..taken {
            back.extend( step( &mut playlist, Direction::Backward ) );
        }
        let mut expected_back: Vec<EntryId> = order[ ..taken - 1 ].to_vec();
        expected_back.reverse();
        prop_assert_eq!( back, expected_back );
        prop_assert_eq!( step( &mut playlist, Direction::Backward ), None );

        let mut replay = Vec::new();
        for _ in 1..taken {
            replay.extend( step( &mut playlist, Direction::Forward ) );
        }
        prop_assert_eq!( replay, order[ 1.. ].to_vec() );
    }


    /// Random repeat never plays the same entry twice in a row when
    /// there is a choice.
    #[test]
    fn random_repeat_avoids_immediate_replay( len in 2usize..10, steps in 1usize..60, seed in any::<u64>() ) {
        let mut playlist = playlist( len, seed );
        playlist.set_repeat( true );
        playlist.set_random( true );

        let mut previous = None;
        for _ in 0..steps {
            let id = step( &mut playlist, Direction::Forward );
            prop_assert!( id.is_some() );
            prop_assert_ne!( id, previous );
            previous = id;
        }
    }


    /// Deleting entries leaves no dangling history.
    #[test]
    fn delete_keeps_history_consistent( len in 2usize..20, walk in 1usize..20, victim in 0usize..20, seed in any::<u64>() ) {
        let mut playlist = playlist( len, seed );
        playlist.set_random( true );
        for _ in 0..walk.min( len ) {
            step( &mut playlist, Direction::Forward );
        }

        playlist.toggle_tag( victim % len );
        playlist.delete( 0 );

        let alive: HashSet<EntryId> = playlist.entries().iter().map( |e| e.id ).collect();
        let scheduler = playlist.scheduler();
        prop_assert!( scheduler.history().iter().all( |id| alive.contains( id ) ) );
        prop_assert!( scheduler.redo().iter().all( |id| alive.contains( id ) ) );
        prop_assert!( scheduler.pool().iter().all( |id| alive.contains( id ) ) );
    }


    /// Due timeouts come out in deadline order and each exactly once.
    #[test]
    fn timeouts_fire_in_deadline_order( delays in prop::collection::vec( 0u64..1000, 1..30 ), cut in 0u64..1000 ) {
        let base = Instant::now();
        let mut queue = TimeoutQueue::new();
        for ( i, delay ) in delays.iter().enumerate() {
            queue.add_at( base + Duration::from_millis( *delay ), ( *delay, i ) );
        }

        let due = queue.take_due( base + Duration::from_millis( cut ) );
        prop_assert!( due.windows( 2 ).all( |w| w[ 0 ].0 <= w[ 1 ].0 ) );
        prop_assert!( due.iter().all( |( delay, _ )| *delay <= cut ) );
        prop_assert_eq!( due.len() + queue.len(), delays.len() );

        let rest = queue.take_due( base + Duration::from_secs( 2 ) );
        prop_assert_eq!( rest.len(), delays.len() - due.len() );
        prop_assert!( queue.is_empty() );
    }


    /// The innermost keymap that claims a key decides its action.
    #[test]
    fn innermost_keymap_wins( keys in prop::collection::vec( prop::char::range( 'a', 'z' ), 1..20 ), inner in prop::char::range( 'a', 'z' ) ) {
        let mut outer = Keymap::new( "outer" );
        for key in &keys {
            outer.bind( *key, 1u8 );
        }
        let mut nested = Keymap::new( "nested" );
        nested.bind( inner, 2u8 );

        let mut stack = KeymapStack::new();
        stack.push( outer );
        stack.push( nested );

        for key in keys {
            let expected = if key == inner { Some( 2 ) } else { Some( 1 ) };
            prop_assert_eq!( stack.process( key ), expected );
        }
        prop_assert_eq!( stack.process( inner ), Some( 2 ) );
    }
}
