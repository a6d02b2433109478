//! Parse Tree
//!
//! Node types for the command language and their canonical textual form.
//!
//! Architecture:
//!   Input → Lexer → Parser → Node tree → Walker → Dispatcher

pub mod types;

pub use types::{quote_word, Node, RedirOp};
