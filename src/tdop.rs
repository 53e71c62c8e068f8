//! Generic operator-precedence (top-down operator precedence) driver.
//!
//! The engine knows nothing about any particular grammar or tree type: it is
//! parameterized by the node type `T` and a table of per-token-kind handler
//! records. A *null* handler fires when its token starts an expression, a
//! *left* handler when its token continues one already parsed. There is no
//! state beyond the handler table, the token cursor, and the call stack; a
//! failure aborts the current parse and nothing else.

use std::collections::HashMap;

use crate::error::ParseError;

/// One lexed token. `kind` is the operator text itself for operators,
/// `"number"` / `"name"` for atoms, `"eof"` at end of input. `pos` is the
/// byte offset in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: &'static str,
    pub text: String,
    pub pos: usize,
}

impl Token {
    pub fn new(kind: &'static str, text: impl Into<String>, pos: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }
}

pub type NullFn<T> = fn(&mut Parser<'_, T>, &Token, i32) -> Result<T, ParseError>;
pub type LeftFn<T> = fn(&mut Parser<'_, T>, &Token, T, i32) -> Result<T, ParseError>;

struct NullInfo<T> {
    nud: NullFn<T>,
    bp: i32,
}

struct LeftInfo<T> {
    led: LeftFn<T>,
    lbp: i32,
    rbp: i32,
}

/// Handler table keyed by token kind, compiled once before parsing starts.
pub struct ParserSpec<T> {
    null_table: HashMap<&'static str, NullInfo<T>>,
    left_table: HashMap<&'static str, LeftInfo<T>>,
}

impl<T> ParserSpec<T> {
    pub fn new() -> Self {
        ParserSpec {
            null_table: HashMap::new(),
            left_table: HashMap::new(),
        }
    }

    /// Register a null handler; `bp` is handed to the handler as its bound.
    pub fn null(&mut self, bp: i32, kinds: &[&'static str], nud: NullFn<T>) {
        for &kind in kinds {
            self.null_table.insert(kind, NullInfo { nud, bp });
        }
    }

    /// Register a left-associative left handler: it recurses with a bound
    /// equal to its own binding power, so equal precedence chains.
    pub fn left(&mut self, lbp: i32, kinds: &[&'static str], led: LeftFn<T>) {
        for &kind in kinds {
            self.left_table.insert(kind, LeftInfo { led, lbp, rbp: lbp });
        }
    }

    /// Register a right-associative left handler: it recurses with a bound
    /// one below its binding power, so an equal-precedence operator to the
    /// right nests instead of chaining.
    pub fn left_right_assoc(&mut self, lbp: i32, kinds: &[&'static str], led: LeftFn<T>) {
        for &kind in kinds {
            self.left_table.insert(
                kind,
                LeftInfo {
                    led,
                    lbp,
                    rbp: lbp - 1,
                },
            );
        }
    }
}

impl<T> Default for ParserSpec<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Precedence-climbing driver over a buffered token stream with one token of
/// lookahead.
pub struct Parser<'a, T> {
    spec: &'a ParserSpec<T>,
    tokens: Vec<Token>,
    cursor: usize,
}

impl<'a, T> Parser<'a, T> {
    pub fn new(spec: &'a ParserSpec<T>, mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new("eof", "", 0));
        }
        Parser {
            spec,
            tokens,
            cursor: 0,
        }
    }

    fn cur(&self) -> &Token {
        // The lexer terminates the stream with "eof"; stay there.
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    pub fn at(&self, kind: &str) -> bool {
        self.cur().kind == kind
    }

    pub fn next(&mut self) {
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
    }

    /// Require the current token kind, then advance past it.
    pub fn eat(&mut self, kind: &'static str) -> Result<(), ParseError> {
        if !self.at(kind) {
            let cur = self.cur();
            return Err(ParseError::Expected {
                expected: kind,
                got: cur.kind.to_string(),
                pos: cur.pos,
            });
        }
        self.next();
        Ok(())
    }

    /// Parse an expression while the next operator binds tighter than `rbp`.
    pub fn parse_until(&mut self, rbp: i32) -> Result<T, ParseError> {
        if self.at("eof") {
            return Err(ParseError::UnexpectedEof {
                pos: self.cur().pos,
            });
        }
        let tok = self.cur().clone();
        self.next();

        let Some(info) = self.spec.null_table.get(tok.kind) else {
            return Err(ParseError::Unexpected {
                kind: tok.kind.to_string(),
                pos: tok.pos,
            });
        };
        let (nud, bp) = (info.nud, info.bp);
        let mut node = nud(self, &tok, bp)?;

        loop {
            let tok = self.cur().clone();
            let Some(info) = self.spec.left_table.get(tok.kind) else {
                break;
            };
            if info.lbp <= rbp {
                break;
            }
            let (led, led_rbp) = (info.led, info.rbp);
            self.next();
            node = led(self, &tok, node, led_rbp)?;
        }
        Ok(node)
    }

    /// Parse one whole expression and require that nothing trails it.
    pub fn parse(&mut self) -> Result<T, ParseError> {
        let node = self.parse_until(0)?;
        self.eat("eof")?;
        Ok(node)
    }
}

// ------------------------------- Tests ------------------------------------ //
