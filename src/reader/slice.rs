//! Zero-Copy Stream Reader
//!
//! Pulls events from the host's tagged content stream. Names and
//! entity-free text borrow straight from the input.

use super::events::{StartTag, StreamEvent};
use crate::core::attributes::parse_attributes;
use crate::core::entities::decode_text;
use crate::core::scanner::Scanner;
use std::fmt;

/// Syntax error in the content stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub message: &'static str,
    /// Byte position in the stream
    pub position: usize,
}

impl ReadError {
    pub fn new(message: &'static str, position: usize) -> Self {
        ReadError { message, position }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

/// Zero-copy reader over a content stream
pub struct StreamReader<'a> {
    scanner: Scanner<'a>,
    failed: bool,
}

impl<'a> StreamReader<'a> {
    pub fn new(input: &'a str) -> Self {
        StreamReader {
            scanner: Scanner::new(input),
            failed: false,
        }
    }

    /// Current byte position in the stream
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Get the next event, `Ok(None)` at end of input
    pub fn next_event(&mut self) -> Result<Option<StreamEvent<'a>>, ReadError> {
        loop {
            if self.scanner.is_eof() {
                return Ok(None);
            }
            if self.scanner.peek() != Some(b'<') {
                return Ok(Some(self.read_text()));
            }
            // Comments and processing instructions carry no content
            if self.scanner.starts_with("<!--") {
                self.skip_past("-->")?;
                continue;
            }
            if self.scanner.starts_with("<?") {
                self.skip_past("?>")?;
                continue;
            }
            return self.read_tag().map(Some);
        }
    }

    fn read_text(&mut self) -> StreamEvent<'a> {
        let start = self.scanner.position();
        let end = self.scanner.find_tag_start().unwrap_or(self.scanner.len());
        self.scanner.set_position(end);
        StreamEvent::Text(decode_text(self.scanner.slice(start, end)))
    }

    fn skip_past(&mut self, terminator: &str) -> Result<(), ReadError> {
        let start = self.scanner.position();
        let rest = self.scanner.slice(start, self.scanner.len());
        match rest.find(terminator) {
            Some(i) => {
                self.scanner.set_position(start + i + terminator.len());
                Ok(())
            }
            None => Err(ReadError::new("unterminated markup", start)),
        }
    }

    fn read_tag(&mut self) -> Result<StreamEvent<'a>, ReadError> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_tag_end_quoted()
            .ok_or_else(|| ReadError::new("unterminated tag", start))?;

        self.scanner.advance(1); // '<'
        let closing = self.scanner.peek() == Some(b'/');
        if closing {
            self.scanner.advance(1);
        }
        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ReadError::new("invalid tag name", start))?;

        let mut content = self.scanner.slice(self.scanner.position(), end);
        self.scanner.set_position(end + 1);

        if closing {
            if !content.trim().is_empty() {
                return Err(ReadError::new("unexpected content in end tag", start));
            }
            return Ok(StreamEvent::End(name));
        }

        let empty = content.ends_with('/');
        if empty {
            content = &content[..content.len() - 1];
        }
        if !content.is_empty() && !content.starts_with([' ', '\t', '\n', '\r']) {
            return Err(ReadError::new("invalid tag name", start));
        }
        let attributes =
            parse_attributes(content).map_err(|message| ReadError::new(message, start))?;
        let tag = StartTag::new(name, attributes);
        Ok(if empty {
            StreamEvent::Empty(tag)
        } else {
            StreamEvent::Start(tag)
        })
    }
}

impl<'a> Iterator for StreamReader<'a> {
    type Item = Result<StreamEvent<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
