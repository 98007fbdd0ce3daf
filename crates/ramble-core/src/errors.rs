//! Structured error types shared across Ramble crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`RambleError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (namespaces, variable names, raw text).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the Ramble expansion and assembly engine.
///
/// Every variant is fatal: recoverable evaluation failures never surface as a
/// `RambleError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RambleError {
    /// Malformed expressions or predicates that do not reduce to a boolean.
    #[error("syntax error: {0}")]
    Syntax(ErrorInfo),
    /// A `{reference}` stayed unresolved while passthrough was disallowed.
    #[error("passthrough error: {0}")]
    Passthrough(ErrorInfo),
    /// Expansion could not complete (runaway recursion and similar).
    #[error("expansion error: {0}")]
    Expansion(ErrorInfo),
    /// Cross-experiment lookups against unknown namespaces or variables.
    #[error("lookup error: {0}")]
    Lookup(ErrorInfo),
    /// Structurally invalid chained experiment declarations.
    #[error("invalid chain: {0}")]
    InvalidChain(ErrorInfo),
    /// A cycle was found while walking chained experiment references.
    #[error("chain cycle: {0}")]
    ChainCycle(ErrorInfo),
    /// Invalid workspace or experiment configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Experiment registry violations (duplicates, bad patterns).
    #[error("registry error: {0}")]
    Registry(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl RambleError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RambleError::Syntax(info)
            | RambleError::Passthrough(info)
            | RambleError::Expansion(info)
            | RambleError::Lookup(info)
            | RambleError::InvalidChain(info)
            | RambleError::ChainCycle(info)
            | RambleError::Config(info)
            | RambleError::Registry(info)
            | RambleError::Serde(info) => info,
        }
    }

    /// Returns the stable error code of the payload.
    pub fn code(&self) -> &str {
        &self.info().code
    }
}
