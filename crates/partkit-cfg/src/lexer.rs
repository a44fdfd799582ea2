//! Line-oriented lexer for content records.
//!
//! Produces four kinds of tokens:
//! - Record names (`MODEL_DEFINITION`)
//! - Key/value pairs (`height = 4`), the value running to the next `}` or end of line
//! - Open brace `{`
//! - Close brace `}`
//!
//! `//` starts a comment that runs to the end of the line.

use crate::error::CfgError;

/// A token in a record file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Record name preceding an open brace.
    Name(String),
    /// `key = value` pair. The value is trimmed and may be empty.
    Pair {
        /// Key text.
        key: String,
        /// Value text.
        value: String,
    },
    /// Left brace `{`.
    Open,
    /// Right brace `}`.
    Close,
}

/// Position in the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Position where the token starts.
    pub pos: Position,
}

/// Lexer for record files.
pub struct Lexer<'a> {
    input: &'a str,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, CfgError> {
        let mut tokens = Vec::new();
        for (idx, raw) in self.input.lines().enumerate() {
            let line = idx + 1;
            let content = match raw.find("//") {
                Some(cut) => &raw[..cut],
                None => raw,
            };
            Self::lex_line(content, line, &mut tokens)?;
        }
        Ok(tokens)
    }

    fn lex_line(content: &str, line: usize, out: &mut Vec<SpannedToken>) -> Result<(), CfgError> {
        let mut offset = 0;
        while offset < content.len() {
            let rest = &content[offset..];
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                break;
            }
            let start = offset + (rest.len() - trimmed.len());
            let pos = Position {
                line,
                col: start + 1,
            };

            if let Some(after) = trimmed.strip_prefix('{') {
                out.push(SpannedToken {
                    token: Token::Open,
                    pos,
                });
                offset = content.len() - after.len();
                continue;
            }
            if let Some(after) = trimmed.strip_prefix('}') {
                out.push(SpannedToken {
                    token: Token::Close,
                    pos,
                });
                offset = content.len() - after.len();
                continue;
            }

            // A segment ends at the next brace; a segment with '=' is a pair.
            let seg_end = trimmed.find(['{', '}']).unwrap_or(trimmed.len());
            let segment = &trimmed[..seg_end];
            let token = match segment.find('=') {
                Some(eq) => {
                    let key = segment[..eq].trim();
                    if key.is_empty() {
                        return Err(CfgError::lexer(line, pos.col, "missing key before '='"));
                    }
                    Token::Pair {
                        key: key.to_string(),
                        value: segment[eq + 1..].trim().to_string(),
                    }
                }
                None => {
                    let name = segment.trim();
                    if name.contains(char::is_whitespace) {
                        return Err(CfgError::lexer(
                            line,
                            pos.col,
                            format!("record name '{}' contains whitespace", name),
                        ));
                    }
                    Token::Name(name.to_string())
                }
            };
            out.push(SpannedToken { token, pos });
            offset = start + seg_end;
        }
        Ok(())
    }
}
