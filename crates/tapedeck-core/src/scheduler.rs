//! Playlist advancement policy.
//!
//! Decides which entry becomes active next under the sequential, repeat and
//! random policies. Random mode draws without replacement from a pool and
//! keeps two history stacks so that stepping back and then forward again
//! replays exactly the same sequence.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use crate::entry::{ EntryId, PlaylistEntry };


/// Direction of travel through the playlist.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Direction {
    Forward,
    Backward,
}


impl Direction {
    /// Maps a signed step (`+1` / `-1`) to a direction.
    pub fn from_step( step: i32 ) -> Self {
        if step < 0 { Direction::Backward } else { Direction::Forward }
    }


    pub fn step( self ) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}


/// Advancement state: policy flags plus random-mode history.
#[derive( Debug )]
pub struct Scheduler {
    repeat: bool,
    random: bool,
    // Visited entries, most recent last. The last element is the current one.
    backward: Vec<EntryId>,
    // Entries stepped back over, next to be replayed last.
    forward: Vec<EntryId>,
    // Not yet visited in this random cycle.
    pool: Vec<EntryId>,
    rng: StdRng,
}


impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}


impl Scheduler {
    /// Creates a sequential, non-repeating scheduler.
    pub fn new() -> Self {
        Self::with_rng( StdRng::from_entropy() )
    }


    /// Creates a scheduler with a deterministic random sequence.
    pub fn with_seed( seed: u64 ) -> Self {
        Self::with_rng( StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( rng: StdRng ) -> Self {
        Self {
            repeat: false,
            random: false,
            backward: Vec::new(),
            forward: Vec::new(),
            pool: Vec::new(),
            rng,
        }
    }


    pub fn repeat( &self ) -> bool {
        self.repeat
    }


    pub fn random( &self ) -> bool {
        self.random
    }


    pub fn set_repeat( &mut self, repeat: bool ) {
        self.repeat = repeat;
    }


    /// Switches random mode on or off.
    ///
    /// Turning it on rebuilds the pool from `entries`. The currently active
    /// entry (if any) seeds the backward history so that the first step
    /// forward can be undone. Turning it off drops all history.
    pub fn set_random( &mut self, random: bool, entries: &[ PlaylistEntry ] ) {
        self.random = random;
        self.reset_history();
        if !random {
            return;
        }
        self.pool = entries.iter().map( |e| e.id ).collect();
        if let Some( active ) = entries.iter().find( |e| e.active ) {
            self.pool.retain( |id| *id != active.id );
            self.backward.push( active.id );
        }
    }


    /// Drops all random-mode history.
    pub fn reset_history( &mut self ) {
        self.backward.clear();
        self.forward.clear();
        self.pool.clear();
    }


    /// Registers a newly added entry with the random pool.
    pub fn entry_added( &mut self, id: EntryId ) {
        if self.random {
            self.pool.push( id );
        }
    }


    /// Removes every history reference to entries not in `alive`,
    /// preserving the relative order of what remains.
    pub fn retain( &mut self, alive: &HashSet<EntryId> ) {
        self.backward.retain( |id| alive.contains( id ) );
        self.forward.retain( |id| alive.contains( id ) );
        self.pool.retain( |id| alive.contains( id ) );
    }


    /// Records an explicit jump to `id` (the user picked an entry).
    ///
    /// In random mode the entry counts as visited and the redo stack is
    /// discarded, like following a new link in a browser history.
    pub fn visit( &mut self, id: EntryId ) {
        if !self.random {
            return;
        }
        self.forward.clear();
        self.pool.retain( |x| *x != id );
        self.backward.retain( |x| *x != id );
        self.backward.push( id );
    }


    /// Computes the next active entry and moves the active flag onto it.
    ///
    /// Returns `None` when the policy has no further entry in that
    /// direction; the active flag is then left untouched.
    pub fn advance( &mut self, entries: &mut [ PlaylistEntry ], direction: Direction ) -> Option<EntryId> {
        if entries.is_empty() {
            return None;
        }
        let old = entries.iter().position( |e| e.active );

        let new = if self.random {
            match direction {
                Direction::Forward => self.random_forward( entries, old )?,
                Direction::Backward => self.random_backward( entries )?,
            }
        } else {
            match old {
                Some( index ) => {
                    let len = entries.len() as isize;
                    let next = index as isize + direction.step();
                    if ( next < 0 || next >= len ) && !self.repeat {
                        return None;
                    }
                    next.rem_euclid( len ) as usize
                }
                None => 0,
            }
        };

        for entry in entries.iter_mut() {
            entry.active = false;
        }
        entries[ new ].active = true;
        tracing::debug!( "Scheduler advanced to {} ({:?})", entries[ new ].id, direction );
        Some( entries[ new ].id )
    }


    fn random_forward( &mut self, entries: &[ PlaylistEntry ], old: Option<usize> ) -> Option<usize> {
        let id = match self.forward.pop() {
            Some( id ) => id,
            None => {
                if self.pool.is_empty() {
                    if !self.repeat {
                        return None;
                    }
                    self.pool = entries.iter().map( |e| e.id ).collect();
                }
                self.draw( old.map( |i| entries[ i ].id ) )
            }
        };
        self.backward.retain( |x| *x != id );
        self.backward.push( id );
        index_of( entries, id )
    }


    fn random_backward( &mut self, entries: &[ PlaylistEntry ] ) -> Option<usize> {
        if self.backward.len() < 2 {
            return None;
        }
        if let Some( current ) = self.backward.pop() {
            self.forward.push( current );
        }
        let id = *self.backward.last()?;
        index_of( entries, id )
    }


    // Picks uniformly from the pool, avoiding the current entry when there
    // is any other choice.
    fn draw( &mut self, current: Option<EntryId> ) -> EntryId {
        let candidates: Vec<usize> = ( 0..self.pool.len() )
            .filter( |&i| Some( self.pool[ i ] ) != current )
            .collect();
        let index = if candidates.is_empty() {
            self.rng.gen_range( 0..self.pool.len() )
        } else {
            candidates[ self.rng.gen_range( 0..candidates.len() ) ]
        };
        self.pool.remove( index )
    }


    /// Entries not yet visited in the current random cycle.
    pub fn pool( &self ) -> &[ EntryId ] {
        &self.pool
    }


    /// Random-mode visit history, most recent last.
    pub fn history( &self ) -> &[ EntryId ] {
        &self.backward
    }


    /// Entries stepped back over that a forward step will replay.
    pub fn redo( &self ) -> &[ EntryId ] {
        &self.forward
    }
}


fn index_of( entries: &[ PlaylistEntry ], id: EntryId ) -> Option<usize> {
    entries.iter().position( |e| e.id == id )
}


#[cfg( test )]
mod tests {
    use super::*;


    fn entries( n: u64 ) -> Vec<PlaylistEntry> {
        ( 0..n ).map( |i| PlaylistEntry::new( EntryId( i ), format!( "/music/{}.ogg", i ) ) ).collect()
    }


    fn active( entries: &[ PlaylistEntry ] ) -> Option<EntryId> {
        entries.iter().find( |e| e.active ).map( |e| e.id )
    }


    #[test]
    fn test_sequential_starts_at_first_entry() {
        let mut list = entries( 3 );
        let mut scheduler = Scheduler::with_seed( 1 );

        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), Some( EntryId( 0 ) ) );
        assert_eq!( active( &list ), Some( EntryId( 0 ) ) );
    }


    #[test]
    fn test_sequential_stops_at_end_without_repeat() {
        let mut list = entries( 3 );
        let mut scheduler = Scheduler::with_seed( 1 );

        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), Some( EntryId( 0 ) ) );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), Some( EntryId( 1 ) ) );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), Some( EntryId( 2 ) ) );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), None );
        assert_eq!( active( &list ), Some( EntryId( 2 ) ) );
    }


    #[test]
    fn test_sequential_wraps_with_repeat() {
        let mut list = entries( 2 );
        list[ 0 ].active = true;
        let mut scheduler = Scheduler::with_seed( 1 );
        scheduler.set_repeat( true );

        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), Some( EntryId( 1 ) ) );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), Some( EntryId( 0 ) ) );
        assert_eq!( list.iter().filter( |e| e.active ).count(), 1 );
    }


    #[test]
    fn test_empty_playlist_yields_nothing() {
        let mut scheduler = Scheduler::with_seed( 1 );
        assert_eq!( scheduler.advance( &mut [], Direction::Forward ), None );
    }


    #[test]
    fn test_random_visits_every_entry_once() {
        let mut list = entries( 6 );
        let mut scheduler = Scheduler::with_seed( 7 );
        scheduler.set_random( true, &list );

        let mut seen = Vec::new();
        while let Some( id ) = scheduler.advance( &mut list, Direction::Forward ) {
            seen.push( id );
        }
        seen.sort();
        assert_eq!( seen, ( 0..6 ).map( EntryId ).collect::<Vec<_>>() );
    }


    #[test]
    fn test_random_back_then_forward_replays() {
        let mut list = entries( 5 );
        let mut scheduler = Scheduler::with_seed( 3 );
        scheduler.set_random( true, &list );

        let a = scheduler.advance( &mut list, Direction::Forward );
        let b = scheduler.advance( &mut list, Direction::Forward );
        let c = scheduler.advance( &mut list, Direction::Forward );

        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), b );
        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), a );
        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), None );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), b );
        assert_eq!( scheduler.advance( &mut list, Direction::Forward ), c );
    }


    #[test]
    fn test_random_undo_returns_to_entry_active_before_toggle() {
        let mut list = entries( 4 );
        list[ 2 ].active = true;
        let mut scheduler = Scheduler::with_seed( 11 );
        scheduler.set_random( true, &list );

        let next = scheduler.advance( &mut list, Direction::Forward );
        assert_ne!( next, Some( EntryId( 2 ) ) );
        assert_eq!( scheduler.advance( &mut list, Direction::Backward ), Some( EntryId( 2 ) ) );
    }


    #[test]
    fn test_random_repeat_refills_pool() {
        let mut list = entries( 3 );
        let mut scheduler = Scheduler::with_seed( 5 );
        scheduler.set_repeat( true );
        scheduler.set_random( true, &list );

        for _ in 0..20 {
            let before = active( &list );
            let next = scheduler.advance( &mut list, Direction::Forward );
            assert!( next.is_some() );
            assert_ne!( next, before );
        }
    }


    #[test]
    fn test_retain_filters_history_in_order() {
        let mut list = entries( 5 );
        let mut scheduler = Scheduler::with_seed( 9 );
        scheduler.set_random( true, &list );
        for _ in 0..3 {
            scheduler.advance( &mut list, Direction::Forward );
        }
        let before: Vec<EntryId> = scheduler.history().to_vec();
        let removed = before[ 1 ];

        let alive: HashSet<EntryId> = list.iter().map( |e| e.id ).filter( |id| *id != removed ).collect();
        scheduler.retain( &alive );

        let expected: Vec<EntryId> = before.into_iter().filter( |id| *id != removed ).collect();
        assert_eq!( scheduler.history(), expected.as_slice() );
        assert!( !scheduler.pool().contains( &removed ) );
    }


    #[test]
    fn test_toggling_random_off_clears_history() {
        let mut list = entries( 3 );
        let mut scheduler = Scheduler::with_seed( 2 );
        scheduler.set_random( true, &list );
        scheduler.advance( &mut list, Direction::Forward );

        scheduler.set_random( false, &list );
        assert!( scheduler.history().is_empty() );
        assert!( scheduler.pool().is_empty() );
        assert_eq!( list.iter().filter( |e| e.active ).count(), 1 );
    }


    #[test]
    fn test_direction_from_step() {
        assert_eq!( Direction::from_step( 1 ), Direction::Forward );
        assert_eq!( Direction::from_step( -1 ), Direction::Backward );
        assert_eq!( Direction::Backward.step(), -1 );
    }
}
