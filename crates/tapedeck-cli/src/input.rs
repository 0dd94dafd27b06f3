//! Status-line text prompts.
//!
//! While a prompt is open its keymap sits on top of the stack and every
//! printable key lands in the prompt's buffer.


/// What the typed text is for.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PromptKind {
    /// "Quit? (y/N)"
    ConfirmQuit,

    /// File list name filter
    Filter,

    /// Tag playlist entries matching a regex
    Tag,

    /// Untag playlist entries matching a regex
    Untag,
}


impl PromptKind {
    pub fn label( self ) -> &'static str {
        match self {
            PromptKind::ConfirmQuit => "Quit? (y/N): ",
            PromptKind::Filter => "Filter: ",
            PromptKind::Tag => "Tag regex: ",
            PromptKind::Untag => "Untag regex: ",
        }
    }
}


/// An open prompt with its edit buffer.
#[derive( Debug )]
pub struct Prompt {
    kind: PromptKind,
    text: String,
    cursor: usize,
}


impl Prompt {
    pub fn new( kind: PromptKind ) -> Self {
        Self { kind, text: String::new(), cursor: 0 }
    }


    pub fn kind( &self ) -> PromptKind {
        self.kind
    }


    pub fn text( &self ) -> &str {
        &self.text
    }


    /// Label plus text, as shown on the status line.
    pub fn display( &self ) -> String {
        format!( "{}{}", self.kind.label(), self.text )
    }


    /// Column of the cursor within [`Prompt::display`].
    pub fn cursor_column( &self ) -> usize {
        self.kind.label().chars().count() + self.text[ ..self.cursor ].chars().count()
    }


    pub fn insert( &mut self, c: char ) {
        self.text.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.text.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character under the cursor.
    pub fn delete( &mut self ) {
        if self.cursor < self.text.len() {
            self.text.remove( self.cursor );
        }
    }


    pub fn left( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.cursor = prev;
        }
    }


    pub fn right( &mut self ) {
        if let Some( c ) = self.text[ self.cursor.. ].chars().next() {
            self.cursor += c.len_utf8();
        }
    }


    pub fn home( &mut self ) {
        self.cursor = 0;
    }


    pub fn end( &mut self ) {
        self.cursor = self.text.len();
    }


    fn prev_boundary( &self ) -> Option<usize> {
        self.text[ ..self.cursor ].char_indices().last().map( |( i, _ )| i )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_editing() {
        let mut prompt = Prompt::new( PromptKind::Tag );
        for c in "abc".chars() {
            prompt.insert( c );
        }
        prompt.left();
        prompt.backspace();
        assert_eq!( prompt.text(), "ac" );

        prompt.home();
        prompt.delete();
        prompt.insert( 'é' );
        assert_eq!( prompt.text(), "éc" );
        assert_eq!( prompt.cursor_column(), "Tag regex: ".len() + 1 );

        prompt.end();
        prompt.right();
        prompt.insert( '!' );
        assert_eq!( prompt.display(), "Tag regex: éc!" );
    }


    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut prompt = Prompt::new( PromptKind::Filter );
        prompt.backspace();
        prompt.left();
        assert_eq!( prompt.text(), "" );
        assert_eq!( prompt.cursor_column(), "Filter: ".len() );
    }
}
