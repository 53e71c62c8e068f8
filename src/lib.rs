//! Schema-validated expression trees plus a TDOP arithmetic parser.
//!
//! Two coupled cores:
//! - A type model for algebraic trees: definitions compile once into an
//!   immutable registry of sum/product descriptors, and every node is
//!   validated against its declared shape at construction and mutation time.
//! - An operator-precedence parser, generic over the tree it builds, whose
//!   arithmetic grammar handlers construct nodes through that validation
//!   engine — so the parser cannot emit a structurally invalid tree.

pub mod arith;
pub mod cli;
pub mod descriptor;
pub mod encode;
pub mod error;
pub mod lexer;
pub mod schema;
pub mod tdop;
pub mod value;
