//! Property paths into parsed webhook bodies.
//!
//! A [`PropertyPath`] addresses a value nested inside a JSON object, a form
//! body or an XML document using dot and bracket notation:
//!
//! | Path                      | Segments                         |
//! |---------------------------|----------------------------------|
//! | `event.type`              | `event`, `type`                  |
//! | `events[0].name`          | `events`, `0`, `name`            |
//! | `data["dotted.key"]`      | `data`, `dotted.key`             |
//! | `['first'][2]`            | `first`, `2`                     |
//!
//! Paths are parsed once, when a receiver is registered, so a malformed path
//! is a configuration error rather than a per-request failure.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member, form field, XML child element or `@attribute`.
    Key(String),
    /// Zero-based array position or repeated-element position.
    Index(usize),
}

/// Parsed, non-empty property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

/// Syntax errors raised while parsing a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,

    #[error("empty segment at position {position}")]
    EmptySegment { position: usize },

    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { position: usize, character: char },

    #[error("unterminated bracket starting at position {position}")]
    UnterminatedBracket { position: usize },

    #[error("unterminated quoted key starting at position {position}")]
    UnterminatedQuote { position: usize },

    #[error("invalid index '{value}' at position {position}")]
    InvalidIndex { position: usize, value: String },
}

impl PropertyPath {
    /// Parse a path expression.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] describing the first syntax error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use webhook_intake_core::{PathSegment, PropertyPath};
    ///
    /// let path = PropertyPath::parse("events[0].name").unwrap();
    /// assert_eq!(
    ///     path.segments(),
    ///     &[
    ///         PathSegment::Key("events".to_string()),
    ///         PathSegment::Index(0),
    ///         PathSegment::Key("name".to_string()),
    ///     ]
    /// );
    /// ```
    pub fn parse(input: &str) -> Result<Self, PathError> {
        Parser::new(input).parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// First segment. Paths always contain at least one.
    pub fn first(&self) -> &PathSegment {
        &self.segments[0]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; present for API symmetry with [`PropertyPath::len`].
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path through a JSON value.
    ///
    /// Keys index objects and indices index arrays; any other combination
    /// does not resolve.
    pub fn resolve_json<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                PathSegment::Key(key) => current.as_object()?.get(key),
                PathSegment::Index(index) => current.as_array()?.get(*index),
            })
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    /// Canonical form: plain keys use dot notation, everything else brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => {
                    f.write_str("[\"")?;
                    for c in key.chars() {
                        if c == '"' || c == '\\' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                    f.write_str("\"]")?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| !matches!(c, '.' | '[' | ']' | '"' | '\'' | '\\') && !c.is_whitespace())
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().collect(),
            pos: 0,
            input,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.input.len(), |(offset, _)| offset)
    }

    fn parse(mut self) -> Result<PropertyPath, PathError> {
        if self.input.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        match self.peek() {
            Some((_, '[')) => segments.push(self.bracket()?),
            _ => segments.push(self.identifier()?),
        }

        while let Some((offset, c)) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(self.identifier()?);
                }
                '[' => segments.push(self.bracket()?),
                other => {
                    return Err(PathError::UnexpectedCharacter {
                        position: offset,
                        character: other,
                    })
                }
            }
        }

        Ok(PropertyPath { segments })
    }

    fn identifier(&mut self) -> Result<PathSegment, PathError> {
        let start = self.offset();
        let mut key = String::new();
        while let Some((offset, c)) = self.peek() {
            match c {
                '.' | '[' => break,
                ']' | '"' | '\'' => {
                    return Err(PathError::UnexpectedCharacter {
                        position: offset,
                        character: c,
                    })
                }
                c if c.is_whitespace() => {
                    return Err(PathError::UnexpectedCharacter {
                        position: offset,
                        character: c,
                    })
                }
                _ => {
                    key.push(c);
                    self.pos += 1;
                }
            }
        }
        if key.is_empty() {
            return Err(PathError::EmptySegment { position: start });
        }
        Ok(PathSegment::Key(key))
    }

    fn bracket(&mut self) -> Result<PathSegment, PathError> {
        let open = self.offset();
        self.pos += 1; // '['

        let segment = match self.peek() {
            Some((_, quote @ ('"' | '\''))) => {
                self.pos += 1;
                let key = self.quoted(quote, open)?;
                if key.is_empty() {
                    return Err(PathError::EmptySegment { position: open });
                }
                PathSegment::Key(key)
            }
            Some(_) => {
                let start = self.offset();
                let mut digits = String::new();
                while let Some((_, c)) = self.peek() {
                    if c == ']' {
                        break;
                    }
                    digits.push(c);
                    self.pos += 1;
                }
                if digits.is_empty() {
                    return Err(PathError::EmptySegment { position: open });
                }
                if !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(PathError::InvalidIndex {
                        position: start,
                        value: digits,
                    });
                }
                let index = digits.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                    position: start,
                    value: digits.clone(),
                })?;
                PathSegment::Index(index)
            }
            None => return Err(PathError::UnterminatedBracket { position: open }),
        };

        match self.peek() {
            Some((_, ']')) => {
                self.pos += 1;
                Ok(segment)
            }
            Some((offset, c)) => Err(PathError::UnexpectedCharacter {
                position: offset,
                character: c,
            }),
            None => Err(PathError::UnterminatedBracket { position: open }),
        }
    }

    fn quoted(&mut self, quote: char, open: usize) -> Result<String, PathError> {
        let mut key = String::new();
        loop {
            match self.peek() {
                Some((_, '\\')) => {
                    self.pos += 1;
                    match self.peek() {
                        Some((_, c)) => {
                            key.push(c);
                            self.pos += 1;
                        }
                        None => return Err(PathError::UnterminatedQuote { position: open }),
                    }
                }
                Some((_, c)) if c == quote => {
                    self.pos += 1;
                    return Ok(key);
                }
                Some((_, c)) => {
                    key.push(c);
                    self.pos += 1;
                }
                None => return Err(PathError::UnterminatedQuote { position: open }),
            }
        }
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
