//! Tokenizer for the arithmetic grammar.
//!
//! Numbers and names become `"number"` / `"name"` tokens; operators are
//! matched longest-first against a fixed table so `<<=` never lexes as
//! `<` `<` `=`. The stream always ends with one `"eof"` token.

use crate::error::ParseError;
use crate::tdop::Token;

/// Operator table, longest first. `kind` is the operator text itself.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", //
    "**", "++", "--", "<<", ">>", "<=", ">=", "!=", "==", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "^=", "|=", //
    "+", "-", "*", "/", "%", "<", ">", "=", "&", "^", "|", "!", "~", "?", ":", ",", "(", ")",
    "[", "]",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if b.is_ascii_digit() {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            out.push(Token::new("number", &src[start..pos], start));
            continue;
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            out.push(Token::new("name", &src[start..pos], start));
            continue;
        }
        let Some(op) = OPERATORS
            .iter()
            .copied()
            .find(|op| src[pos..].starts_with(op))
        else {
            return Err(ParseError::BadToken {
                text: src[pos..].chars().take(1).collect(),
                pos,
            });
        };
        out.push(Token::new(op, op, pos));
        pos += op.len();
    }

    out.push(Token::new("eof", "", src.len()));
    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
