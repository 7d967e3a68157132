//! Parser for the flint scripting language
//!
//! This crate turns source text into the AST consumed by the evaluator. It
//! uses pest for parsing; all name resolution and type checking happens at
//! evaluation time.

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::*;
pub use error::{ParseError, ParseResult};
pub use parser::{parse_expression, parse_program, FlintParser, Rule};
