//! Restricted arithmetic and logic expressions embedded in templates.
//!
//! Evaluation is opportunistic: most payloads are plain text, so parse
//! failures, unsupported constructs and operand mismatches are reported as
//! recoverable [`EvalError`]s that callers answer by keeping the literal text.
//! Only failed cross-experiment lookups are fatal.

mod ast;
mod eval;
mod functions;
mod lexer;
mod parser;
mod value;

use ramble_core::RambleError;
use thiserror::Error;

pub use ast::{BinOp, BoolOp, CompareOp, Expr, UnaryOp};
pub use eval::Evaluator;
pub use functions::{simplify_str, ALLOWED_FUNCTIONS};
pub use parser::parse_expression;
pub use value::Value;

/// Failure while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The text is not an expression of the supported grammar.
    #[error("cannot parse expression: {0}")]
    Parse(String),
    /// The text parses but uses a construct outside the allow-list.
    #[error("unsupported expression: {0}")]
    Unsupported(String),
    /// Operands of incompatible types, division by zero, overflow.
    #[error("invalid operands: {0}")]
    Operand(String),
    /// Failure that must abort the surrounding expansion.
    #[error(transparent)]
    Fatal(#[from] RambleError),
}

impl EvalError {
    /// Returns true when the caller may fall back to the literal text.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EvalError::Fatal(_))
    }
}
