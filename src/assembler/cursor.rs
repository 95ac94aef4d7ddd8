/// A random-access lookahead reader over an already-materialized sequence.
///
/// The lexer drives one of these over characters and the resolver drives
/// one over tokens; neither needs more than single-element lookahead, but
/// `peek_at` is part of the reusable contract.
#[derive(Debug)]
pub struct Cursor<T> {
    elems: Vec<T>,
    pos: usize,
}

impl<T> Cursor<T> {
    pub fn new(elems: Vec<T>) -> Self {
        Cursor { elems, pos: 0 }
    }

    pub fn peek(&self) -> Option<&T> {
        self.peek_at(0)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&T> {
        self.elems.get(self.pos + offset)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn reset(&mut self) {
        self.seek(0);
    }

    /// Advances until `stop` holds for the current element or the sequence
    /// is exhausted. The stop element itself is not consumed.
    pub fn skip_until(&mut self, stop: impl Fn(&T) -> bool) {
        while let Some(elem) = self.peek() {
            if stop(elem) {
                return;
            }
            self.pos += 1;
        }
    }
}

impl<T: Clone> Cursor<T> {
    /// Returns the current element and advances past it.
    ///
    /// Callers must have checked `peek` first; consuming past the end is a
    /// programming error, not a recoverable condition, and panics.
    pub fn consume(&mut self) -> T {
        let elem = self.elems[self.pos].clone();
        self.pos += 1;
        elem
    }
}
