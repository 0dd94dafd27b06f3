//! Modal key dispatch.
//!
//! A [`KeymapStack`] holds flat key → action tables. Lookups walk from the
//! most recently pushed table outward, so the innermost context wins and
//! unhandled keys fall through to the global table at the base. Modal
//! contexts (prompts, list switches) are modelled purely by pushing,
//! popping or replacing tables.

use std::collections::HashMap;
use std::hash::Hash;


/// What a bound key produces.
#[derive( Debug, Clone )]
pub enum Binding<K, A> {
    /// A fixed action.
    Action( A ),

    /// An action built from the key itself (digit keys, typed characters).
    WithKey( fn( K ) -> A ),
}


/// A flat table of key bindings.
#[derive( Debug, Clone )]
pub struct Keymap<K, A> {
    name: &'static str,
    bindings: HashMap<K, Binding<K, A>>,
    fallback: Option<fn( K ) -> Option<A>>,
}


impl<K, A> Keymap<K, A>
where
    K: Copy + Eq + Hash,
    A: Clone,
{
    /// Creates an empty keymap. The name only shows up in logs.
    pub fn new( name: &'static str ) -> Self {
        Self {
            name,
            bindings: HashMap::new(),
            fallback: None,
        }
    }


    /// Binds a key to a fixed action, replacing any previous binding.
    pub fn bind( &mut self, key: K, action: A ) -> &mut Self {
        self.bindings.insert( key, Binding::Action( action ) );
        self
    }


    /// Binds several keys to the same action.
    pub fn bind_all( &mut self, keys: impl IntoIterator<Item = K>, action: A ) -> &mut Self {
        for key in keys {
            self.bind( key, action.clone() );
        }
        self
    }


    /// Binds keys to an action constructed from the pressed key.
    pub fn bind_with_key( &mut self, keys: impl IntoIterator<Item = K>, build: fn( K ) -> A ) -> &mut Self {
        for key in keys {
            self.bindings.insert( key, Binding::WithKey( build ) );
        }
        self
    }


    /// Claims every key without an explicit binding for which `fallback`
    /// returns an action. Text prompts use this to consume printable keys.
    pub fn set_fallback( &mut self, fallback: fn( K ) -> Option<A> ) -> &mut Self {
        self.fallback = Some( fallback );
        self
    }


    /// Returns the action bound to `key`, if this keymap claims it.
    pub fn lookup( &self, key: K ) -> Option<A> {
        match self.bindings.get( &key ) {
            Some( Binding::Action( action ) ) => Some( action.clone() ),
            Some( Binding::WithKey( build ) ) => Some( build( key ) ),
            None => self.fallback.and_then( |f| f( key ) ),
        }
    }


    /// Returns true if `key` is claimed by this keymap.
    pub fn claims( &self, key: K ) -> bool {
        self.lookup( key ).is_some()
    }


    /// Name given at construction.
    pub fn name( &self ) -> &'static str {
        self.name
    }


    /// Number of explicit bindings.
    pub fn len( &self ) -> usize {
        self.bindings.len()
    }


    /// Returns true if there are no explicit bindings and no fallback.
    pub fn is_empty( &self ) -> bool {
        self.bindings.is_empty() && self.fallback.is_none()
    }
}


/// Stack of keymaps; index 0 is the base (global) context.
#[derive( Debug, Clone )]
pub struct KeymapStack<K, A> {
    maps: Vec<Keymap<K, A>>,
}


impl<K, A> KeymapStack<K, A>
where
    K: Copy + Eq + Hash,
    A: Clone,
{
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self { maps: Vec::new() }
    }


    /// Enters a new innermost context.
    pub fn push( &mut self, map: Keymap<K, A> ) {
        tracing::trace!( "Keymap push: {}", map.name() );
        self.maps.push( map );
    }


    /// Leaves the innermost context.
    pub fn pop( &mut self ) -> Option<Keymap<K, A>> {
        let map = self.maps.pop();
        if let Some( ref m ) = map {
            tracing::trace!( "Keymap pop: {}", m.name() );
        }
        map
    }


    /// Replaces the keymap at `level` (0 = base), returning the old one.
    ///
    /// Returns `None` and leaves the stack untouched if `level` is out of range.
    pub fn replace( &mut self, level: usize, map: Keymap<K, A> ) -> Option<Keymap<K, A>> {
        let slot = self.maps.get_mut( level )?;
        tracing::trace!( "Keymap replace at {}: {} -> {}", level, slot.name(), map.name() );
        Some( std::mem::replace( slot, map ) )
    }


    /// Resolves `key` against the innermost keymap that claims it.
    pub fn process( &self, key: K ) -> Option<A> {
        self.maps.iter().rev().find_map( |map| map.lookup( key ) )
    }


    /// Name of the innermost keymap.
    pub fn top_name( &self ) -> Option<&'static str> {
        self.maps.last().map( |m| m.name() )
    }


    /// Number of stacked keymaps.
    pub fn depth( &self ) -> usize {
        self.maps.len()
    }


    /// Returns true if nothing is stacked.
    pub fn is_empty( &self ) -> bool {
        self.maps.is_empty()
    }
}


impl<K, A> Default for KeymapStack<K, A>
where
    K: Copy + Eq + Hash,
    A: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[derive( Debug, Clone, PartialEq )]
    enum Act {
        Named( &'static str ),
        Typed( char ),
    }


    fn keymap( name: &'static str, keys: &str ) -> Keymap<char, Act> {
        let mut map = Keymap::new( name );
        for key in keys.chars() {
            map.bind( key, Act::Named( name ) );
        }
        map
    }


    #[test]
    fn test_empty_keymap_claims_nothing() {
        let map: Keymap<char, Act> = Keymap::new( "empty" );
        assert!( map.lookup( 'a' ).is_none() );
        assert!( map.is_empty() );
    }


    #[test]
    fn test_bind_with_key_passes_key() {
        let mut map = Keymap::new( "digits" );
        map.bind_with_key( '0'..='9', Act::Typed );
        assert_eq!( map.lookup( '7' ), Some( Act::Typed( '7' ) ) );
        assert_eq!( map.lookup( 'x' ), None );
    }


    #[test]
    fn test_bind_all_shares_action() {
        let mut map = Keymap::new( "multi" );
        map.bind_all( [ 'a', 'b' ], Act::Named( "ab" ) );
        assert_eq!( map.lookup( 'a' ), Some( Act::Named( "ab" ) ) );
        assert_eq!( map.lookup( 'b' ), Some( Act::Named( "ab" ) ) );
        assert_eq!( map.len(), 2 );
    }


    #[test]
    fn test_innermost_keymap_wins_and_falls_through() {
        let mut stack = KeymapStack::new();
        stack.push( keymap( "outer", "abc" ) );
        stack.push( keymap( "inner", "cde" ) );

        assert_eq!( stack.process( 'a' ), Some( Act::Named( "outer" ) ) );
        assert_eq!( stack.process( 'c' ), Some( Act::Named( "inner" ) ) );
        assert_eq!( stack.process( 'd' ), Some( Act::Named( "inner" ) ) );
        assert_eq!( stack.process( 'x' ), None );

        stack.pop();
        assert_eq!( stack.process( 'c' ), Some( Act::Named( "outer" ) ) );
        assert_eq!( stack.process( 'd' ), None );
    }


    #[test]
    fn test_fallback_consumes_printable_keys() {
        let mut stack = KeymapStack::new();
        stack.push( keymap( "global", "q" ) );

        let mut prompt = Keymap::new( "prompt" );
        prompt.bind( '\n', Act::Named( "submit" ) );
        prompt.set_fallback( |c| if c.is_control() { None } else { Some( Act::Typed( c ) ) } );
        stack.push( prompt );

        assert_eq!( stack.process( 'q' ), Some( Act::Typed( 'q' ) ) );
        assert_eq!( stack.process( '\n' ), Some( Act::Named( "submit" ) ) );
        assert_eq!( stack.top_name(), Some( "prompt" ) );

        stack.pop();
        assert_eq!( stack.process( 'q' ), Some( Act::Named( "global" ) ) );
    }


    #[test]
    fn test_replace_swaps_context_in_place() {
        let mut stack = KeymapStack::new();
        stack.push( keymap( "global", "q" ) );
        stack.push( keymap( "filelist", "a" ) );

        let old = stack.replace( 1, keymap( "playlist", "d" ) );
        assert_eq!( old.map( |m| m.name() ), Some( "filelist" ) );
        assert_eq!( stack.process( 'a' ), None );
        assert_eq!( stack.process( 'd' ), Some( Act::Named( "playlist" ) ) );
        assert_eq!( stack.depth(), 2 );
        assert!( stack.replace( 5, keymap( "nope", "" ) ).is_none() );
    }
}
