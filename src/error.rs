//! Error taxonomy, one family per subsystem.
//!
//! - `SchemaError`: defects in the schema itself. Fatal; compilation aborts
//!   and no partial registry is ever returned.
//! - `FieldError`: rejected construction or mutation of a tree node. Always
//!   surfaced to the caller, never coerced or defaulted away.
//! - `ParseError`: aborts the current parse attempt only. Carries the
//!   offending token kind and byte position where one exists.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate definition of type {0:?}")]
    DuplicateDefinition(String),

    #[error("duplicate constructor {cons:?} in sum {sum:?}")]
    DuplicateConstructor { sum: String, cons: String },

    #[error("unknown type {name:?} referenced by {referrer:?}")]
    UnknownType { name: String, referrer: String },
}

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("duplicate assignment of field {field:?} on {type_name}")]
    DuplicateAssignment { type_name: String, field: String },

    /// Every still-missing required field is reported at once, not just the
    /// first one found.
    #[error("missing required fields {fields:?} on {type_name}")]
    MissingFields { type_name: String, fields: Vec<String> },

    #[error("field {field:?} of {type_name} expects {expected}, got {actual}")]
    ShapeMismatch {
        type_name: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("{type_name} has no field {field:?}")]
    UnknownField { type_name: String, field: String },

    #[error("{type_name} takes {arity} fields, got {got} positional values")]
    TooManyPositional {
        type_name: String,
        arity: usize,
        got: usize,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token {kind:?} at position {pos}")]
    Unexpected { kind: String, pos: usize },

    #[error("unexpected end of input at position {pos}")]
    UnexpectedEof { pos: usize },

    #[error("expected {expected:?}, got {got:?} at position {pos}")]
    Expected {
        expected: &'static str,
        got: String,
        pos: usize,
    },

    #[error("bad token {text:?} at position {pos}")]
    BadToken { text: String, pos: usize },

    #[error("can't assign to {target}")]
    InvalidTarget { target: String },

    #[error("{target} can't be called")]
    NotCallable { target: String },

    #[error("{target} can't be indexed")]
    NotIndexable { target: String },

    /// Node construction failed inside a handler. With a well-formed grammar
    /// this indicates a handler bug, but it is surfaced rather than hidden.
    #[error(transparent)]
    Node(#[from] FieldError),
}
