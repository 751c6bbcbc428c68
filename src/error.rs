// ABOUTME: Error types for lexing, parsing, and built-in contract violations

use crate::token::Span;
use thiserror::Error;

/// A single parse error, accumulated by the parser rather than raised
/// immediately, so the driver can report every problem in a source file.
#[derive(Debug, Clone, Error)]
#[error("{span} -- {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

/// Raised by built-in implementations when the calling contract is
/// violated (wrong arity, wrong argument type). The evaluator converts
/// these into ordinary `Error`-class instances before they become visible
/// to Pluto code; `HostError` never crosses that boundary itself.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("the ${name} parameter of `{pattern}` must be of type {expected}, not {actual}")]
    TypeMismatch {
        pattern: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{message}")]
    Generic { message: String },

    #[error("Since the prelude isn't loaded, errors cannot be thrown")]
    PreludeNotLoaded,
}

impl HostError {
    pub fn generic(message: impl Into<String>) -> Self {
        HostError::Generic {
            message: message.into(),
        }
    }

    /// The `tag` a thrown `Error` instance should carry for this failure.
    pub fn tag(&self) -> &'static str {
        match self {
            HostError::TypeMismatch { .. } => "TypeError",
            HostError::Generic { .. } => "GeneralError",
            HostError::PreludeNotLoaded => "GeneralError",
        }
    }
}

/// Errors surfaced by the CLI driver itself (file IO), kept separate from
/// the language's own error-as-value mechanism.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize REPL: {0}")]
    Repl(String),
}
