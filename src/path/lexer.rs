//! Path Lexer
//!
//! Tokenizes relative path expressions such as `uR{'role': 19}d`. Letters
//! are single-character steps; braces open a check literal written as a
//! dictionary of quoted keys to string or integer values.

/// Path token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// One step letter
    Step(char),
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Int(i64),
    String(String),
    /// End of input
    Eof,
}

/// Token with its byte position in the expression
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Path lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Get the next token, or an error message with its position
    pub fn next_token(&mut self) -> Result<Spanned, (usize, String)> {
        self.skip_whitespace();
        let position = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    position,
                })
            }
        };

        let token = match c {
            '{' => {
                self.advance(1);
                Token::LeftBrace
            }
            '}' => {
                self.advance(1);
                Token::RightBrace
            }
            ':' => {
                self.advance(1);
                Token::Colon
            }
            ',' => {
                self.advance(1);
                Token::Comma
            }
            '\'' | '"' => self.read_string(c)?,
            '-' | '0'..='9' => self.read_int()?,
            c if c.is_ascii_alphabetic() => {
                self.advance(1);
                Token::Step(c)
            }
            other => return Err((position, format!("unexpected character {other:?}"))),
        };
        Ok(Spanned { token, position })
    }

    fn read_string(&mut self, quote: char) -> Result<Token, (usize, String)> {
        let start = self.pos;
        self.advance(1);
        let mut value = String::new();
        while let Some(c) = self.peek() {
            self.advance(c.len_utf8());
            match c {
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        break;
                    };
                    self.advance(escaped.len_utf8());
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote => return Ok(Token::String(value)),
                c => value.push(c),
            }
        }
        Err((start, "unterminated string".to_string()))
    }

    fn read_int(&mut self) -> Result<Token, (usize, String)> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance(1);
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        self.input[start..self.pos]
            .parse()
            .map(Token::Int)
            .map_err(|_| (start, "invalid integer".to_string()))
    }
}
