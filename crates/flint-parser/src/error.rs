//! Parser error types

use pest::error::Error as PestError;
use thiserror::Error;

use crate::parser::Rule;

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error type
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] Box<PestError<Rule>>),

    #[error("Numeric literal '{0}' is out of range.")]
    NumberOutOfRange(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Incrementation not appropriate in current context.")]
    InvalidIncrementTarget,

    #[error("Cannot use both pre and post fix incrementation/decrementation operators at the same time.")]
    MixedIncrement,
}

impl From<PestError<Rule>> for ParseError {
    fn from(err: PestError<Rule>) -> Self {
        ParseError::Syntax(Box::new(err))
    }
}
