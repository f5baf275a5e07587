//! SIMD-accelerated stream scanning using memchr
//!
//! The content stream is valid UTF-8 (`&str`). Every delimiter the scanner
//! looks for is ASCII, so each returned position is a char boundary and
//! slicing never panics.

use memchr::{memchr, memchr3};

/// Scanner for tagged stream delimiter detection
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Get the current byte position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Set the current byte position
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Total input length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.input.len()
    }

    /// Check if we've reached the end
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn bytes(&self) -> &'a [u8] {
        &self.input.as_bytes()[self.pos..]
    }

    /// Get a slice between two byte positions found by this scanner
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    /// Peek at current byte without advancing
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// Advance by n bytes
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Find next '<' (tag start) using SIMD
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        memchr(b'<', self.bytes()).map(|i| self.pos + i)
    }

    /// Find tag end while handling quotes properly
    /// Returns the position of '>' that is not inside quotes
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let mut pos = self.pos;
        let mut quote: Option<u8> = None;

        while pos < bytes.len() {
            // Jump straight to the next interesting byte
            let rest = &bytes[pos..];
            let hit = match quote {
                Some(q) => memchr(q, rest),
                None => memchr3(b'>', b'"', b'\'', rest),
            }?;
            pos += hit;
            match (quote, bytes[pos]) {
                (Some(q), b) if b == q => quote = None,
                (None, b'>') => return Some(pos),
                (None, b @ (b'"' | b'\'')) => quote = Some(b),
                _ => {}
            }
            pos += 1;
        }
        None
    }

    /// Check if input starts with a byte sequence at current position
    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Read a name (element or attribute), advancing past it
    pub fn read_name(&mut self) -> Option<&'a str> {
        let bytes = self.input.as_bytes();
        let start = self.pos;

        if start >= bytes.len() || !is_name_start_char(bytes[start]) {
            return None;
        }

        self.pos += 1;
        while self.pos < bytes.len() && is_name_char(bytes[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

/// Check if byte is a valid name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub(crate) fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is a valid name character
///
/// Host attribute keys look like `IAccessible2::attribute_tag`, so colons
/// are accepted anywhere in a name.
#[inline]
pub(crate) fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}
