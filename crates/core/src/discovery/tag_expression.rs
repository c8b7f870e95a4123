//! Boolean expressions over tags
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := and ('|' and)*
//! and     := not ('&' not)*
//! not     := '!' not | primary
//! primary := TAG | '(' expr ')'
//! ```
//!
//! Whitespace between tokens is ignored. A tag token is any run of
//! characters that are neither whitespace nor operators, and must be a
//! valid [`TestTag`].

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::TestTag;

/// Deepest `!` / parenthesis nesting accepted by [`TagExpression::parse`]
pub const MAX_NESTING_DEPTH: usize = 256;

// `&` and `|` chains are kept flat, so tree depth only grows with nesting
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Tag(TestTag),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    fn evaluate(&self, tags: &BTreeSet<TestTag>) -> bool {
        match self {
            Node::Tag(tag) => tags.contains(tag),
            Node::Not(inner) => !inner.evaluate(tags),
            Node::And(operands) => operands.iter().all(|operand| operand.evaluate(tags)),
            Node::Or(operands) => operands.iter().any(|operand| operand.evaluate(tags)),
        }
    }

    fn write_operands(
        f: &mut fmt::Formatter<'_>,
        operands: &[Node],
        operator: &str,
    ) -> fmt::Result {
        f.write_str("(")?;
        for (index, operand) in operands.iter().enumerate() {
            if index > 0 {
                write!(f, " {operator} ")?;
            }
            write!(f, "{operand}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Tag(tag) => write!(f, "{tag}"),
            Node::Not(inner) => write!(f, "!{inner}"),
            Node::And(operands) => Node::write_operands(f, operands, "&"),
            Node::Or(operands) => Node::write_operands(f, operands, "|"),
        }
    }
}

/// A parsed tag expression such as `fast & !(db | network)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagExpression {
    source: String,
    root: Node,
}

impl TagExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens,
            position: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error_at(token.offset, "unexpected trailing input"));
        }
        Ok(Self {
            source: expression.trim().to_string(),
            root,
        })
    }

    /// The expression as written (trimmed)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a set of effective tags
    pub fn evaluate(&self, tags: &BTreeSet<TestTag>) -> bool {
        self.root.evaluate(tags)
    }
}

/// Fully parenthesised canonical form
impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Tag(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '&' => TokenKind::And,
            '|' => TokenKind::Or,
            '!' => TokenKind::Not,
            _ => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '&' | '|' | '!') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if !TestTag::is_valid(&name) {
                    return Err(Error::TagExpression {
                        expression: expression.to_string(),
                        position: offset,
                        message: format!("'{name}' is not a valid tag"),
                    });
                }
                tokens.push(Token {
                    kind: TokenKind::Tag(name),
                    offset,
                });
                continue;
            }
        };
        chars.next();
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|token| &token.kind == kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error_at(&self, position: usize, message: &str) -> Error {
        Error::TagExpression {
            expression: self.expression.to_string(),
            position,
            message: message.to_string(),
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut operands = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            operands.push(self.parse_and()?);
        }
        Ok(match operands.len() {
            1 => operands.remove(0),
            _ => Node::Or(operands),
        })
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut operands = vec![self.parse_not()?];
        while self.eat(&TokenKind::And) {
            operands.push(self.parse_not()?);
        }
        Ok(match operands.len() {
            1 => operands.remove(0),
            _ => Node::And(operands),
        })
    }

    fn parse_not(&mut self) -> Result<Node> {
        let Some(offset) = self.peek().map(|token| token.offset) else {
            return self.parse_primary();
        };
        if !self.eat(&TokenKind::Not) {
            return self.parse_primary();
        }
        self.descend(offset)?;
        let inner = self.parse_not();
        self.depth -= 1;
        Ok(Node::Not(Box::new(inner?)))
    }

    fn descend(&mut self, offset: usize) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_at(offset, "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let Some(token) = self.peek().cloned() else {
            let message = if self.tokens.is_empty() {
                "empty tag expression"
            } else {
                "missing operand at end of expression"
            };
            return Err(self.error_at(self.expression.len(), message));
        };

        match token.kind {
            TokenKind::Tag(name) => {
                self.position += 1;
                Ok(Node::Tag(TestTag::new(name)?))
            }
            TokenKind::LParen => {
                self.position += 1;
                self.descend(token.offset)?;
                let inner = self.parse_or();
                self.depth -= 1;
                let inner = inner?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(self.error_at(token.offset, "unbalanced '('"));
                }
                Ok(inner)
            }
            TokenKind::RParen => Err(self.error_at(token.offset, "unexpected ')'")),
            TokenKind::And | TokenKind::Or | TokenKind::Not => {
                Err(self.error_at(token.offset, "missing operand before operator"))
            }
        }
    }
}
