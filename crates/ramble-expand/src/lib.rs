#![deny(missing_docs)]
#![doc = "Template parsing, expression evaluation and variable expansion for Ramble."]

/// Variable expansion entry points.
pub mod expander;
/// Expression parsing and evaluation.
pub mod expr;
/// Format specs applied to expanded values.
pub mod format;
/// Brace-template parsing.
pub mod template;

pub use expander::{ExpandOptions, Expander, ExpansionConfig};
pub use expr::{parse_expression, EvalError, Evaluator, Expr, Value};
pub use format::{apply_format, FormatError};
pub use template::{parse_template, unescape_braces, NodeId, TemplateNode, TemplateTree};
