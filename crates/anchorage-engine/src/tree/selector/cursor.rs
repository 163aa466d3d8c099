/// A cursor for character-by-character selector parsing with position tracking.
///
/// Positions are character indices into the selector text, which is what
/// [`super::SelectorError`] reports.
#[derive(Clone)]
pub struct Cursor {
    chars: Vec<char>,
    /// Current index into `chars`.
    pub i: usize,
}

impl Cursor {
    pub fn new(s: &str) -> Self {
        Self {
            chars: s.chars().collect(),
            i: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.i
    }

    pub fn eof(&self) -> bool {
        self.i >= self.chars.len()
    }

    /// Peeks at the current character without advancing.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    /// Checks if the remaining input starts with `pat`.
    pub fn starts_with(&self, pat: &str) -> bool {
        let mut index = self.i;
        for expected in pat.chars() {
            if self.chars.get(index) != Some(&expected) {
                return false;
            }
            index += 1;
        }
        true
    }

    /// Advances by one character, returning the consumed character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += 1;
        Some(c)
    }

    /// Advances by `n` characters.
    pub fn bump_n(&mut self, n: usize) {
        self.i += n;
    }

    /// Skips whitespace, returning how many characters were skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.i;
        while self.peek().is_some_and(char::is_whitespace) {
            self.i += 1;
        }
        self.i - start
    }
}
