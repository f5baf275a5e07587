//! Path Parser
//!
//! Parses a token stream into steps. Grammar:
//!
//! ```text
//! path    := step*
//! step    := move | MOVE literal | 'c' literal
//! move    := 'b' | 'a' | 'u' | 'd' | 'l' | 'r'
//! literal := '{' (STRING ':' (STRING | INT) ','?)* '}'
//! ```

use super::lexer::{Lexer, Spanned, Token};
use crate::error::{Error, Result};
use crate::search::Constraints;

/// Direction of a path step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Previous text in document flow, then its parent
    Before,
    /// Next node in document order with a greater offset
    After,
    Up,
    /// First child
    Down,
    /// Previous sibling
    Left,
    /// Next sibling
    Right,
}

impl Axis {
    fn from_letter(c: char) -> Option<Axis> {
        Some(match c {
            'b' => Axis::Before,
            'a' => Axis::After,
            'u' => Axis::Up,
            'd' => Axis::Down,
            'l' => Axis::Left,
            'r' => Axis::Right,
            _ => return None,
        })
    }
}

/// Parsed step: a move, a check, or a move repeated until the check holds
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// `None` for a check-only step
    pub axis: Option<Axis>,
    pub check: Option<Check>,
}

/// Check literal with the position it was written at
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub constraints: Constraints,
    pub position: usize,
}

/// Path parser
pub struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    current: Spanned,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let current = next(source, &mut lexer)?;
        Ok(Parser {
            source,
            lexer,
            current,
        })
    }

    fn advance(&mut self) -> Result<Spanned> {
        let following = next(self.source, &mut self.lexer)?;
        Ok(std::mem::replace(&mut self.current, following))
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> Error {
        Error::malformed_path(self.source, position, reason)
    }

    /// Parse the whole expression
    pub fn parse(mut self) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        loop {
            let Spanned { token, position } = self.advance()?;
            let letter = match token {
                Token::Eof => return Ok(steps),
                Token::Step(c) => c,
                other => return Err(self.error(position, format!("expected a step, found {other:?}"))),
            };
            let step = if letter == 'c' {
                Step {
                    axis: None,
                    check: Some(self.parse_literal()?),
                }
            } else if let Some(axis) = Axis::from_letter(letter) {
                Step { axis: Some(axis), check: None }
            } else if let Some(axis) = Axis::from_letter(letter.to_ascii_lowercase()) {
                Step {
                    axis: Some(axis),
                    check: Some(self.parse_literal()?),
                }
            } else {
                return Err(self.error(position, format!("invalid step {letter:?}")));
            };
            steps.push(step);
        }
    }

    fn parse_literal(&mut self) -> Result<Check> {
        let Spanned { token, position } = self.advance()?;
        if token != Token::LeftBrace {
            return Err(self.error(position, "expected a criteria literal"));
        }
        let mut constraints = Constraints::default();
        loop {
            let Spanned { token, position: key_position } = self.advance()?;
            let key = match token {
                Token::RightBrace => break,
                Token::String(key) => key,
                _ => return Err(self.error(key_position, "expected a quoted key")),
            };
            let Spanned { token, position } = self.advance()?;
            if token != Token::Colon {
                return Err(self.error(position, "expected ':'"));
            }
            let Spanned { token, position } = self.advance()?;
            let value = match token {
                Token::String(value) => value,
                Token::Int(value) => value.to_string(),
                _ => return Err(self.error(position, "expected a string or integer value")),
            };
            if key == "relativePath" || !constraints.set(&key, value) {
                return Err(self.error(key_position, format!("unsupported criteria key {key:?}")));
            }
            if self.current.token == Token::Comma {
                self.advance()?;
            }
        }
        Ok(Check {
            constraints,
            position,
        })
    }
}

fn next(source: &str, lexer: &mut Lexer<'_>) -> Result<Spanned> {
    lexer
        .next_token()
        .map_err(|(position, reason)| Error::malformed_path(source, position, reason))
}

/// Parse a path expression
pub fn parse(source: &str) -> Result<Vec<Step>> {
    Parser::new(source)?.parse()
}
