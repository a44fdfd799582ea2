//! Record parser: builds a [`ConfigNode`] tree from tokens.
//!
//! The parser does not interpret keys; it only checks that record names are
//! followed by an open brace and that braces balance.

use crate::error::CfgError;
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::node::ConfigNode;
use std::path::Path;

/// Name given to the implicit root record.
pub const ROOT_NAME: &str = "root";

/// Parser over a token stream.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// Tokenize and parse `input` into a root record.
    pub fn parse(input: &str) -> Result<ConfigNode, CfgError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.parse_root()
    }

    fn parse_root(&mut self) -> Result<ConfigNode, CfgError> {
        // Stack of open records; index 0 is the root.
        let mut stack = vec![ConfigNode::new(ROOT_NAME)];
        let mut open_lines = vec![0usize];

        while let Some(spanned) = self.next() {
            let line = spanned.pos.line;
            match spanned.token {
                Token::Pair { key, value } => {
                    if let Some(top) = stack.last_mut() {
                        top.add_value(key, value);
                    }
                }
                Token::Name(name) => match self.next() {
                    Some(SpannedToken {
                        token: Token::Open, ..
                    }) => {
                        stack.push(ConfigNode::new(name));
                        open_lines.push(line);
                    }
                    _ => {
                        return Err(CfgError::parser(
                            line,
                            format!("expected '{{' after record name '{}'", name),
                        ));
                    }
                },
                Token::Open => {
                    return Err(CfgError::parser(line, "'{' without a record name"));
                }
                Token::Close => {
                    if stack.len() == 1 {
                        return Err(CfgError::parser(line, "unmatched '}'"));
                    }
                    open_lines.pop();
                    if let Some(done) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.add_node(done);
                        }
                    }
                }
            }
        }

        if stack.len() > 1 {
            let name = stack.last().map(|n| n.name.clone()).unwrap_or_default();
            let line = open_lines.last().copied().unwrap_or(0);
            return Err(CfgError::parser(
                line,
                format!("record '{}' is never closed", name),
            ));
        }
        Ok(stack.pop().unwrap_or_else(|| ConfigNode::new(ROOT_NAME)))
    }

    fn next(&mut self) -> Option<SpannedToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

/// Parse record text into a root record.
pub fn parse(input: &str) -> Result<ConfigNode, CfgError> {
    Parser::parse(input)
}

/// Read and parse a record file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ConfigNode, CfgError> {
    let text = std::fs::read_to_string(path)?;
    Parser::parse(&text)
}
