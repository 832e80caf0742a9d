//! Error types for the guard crate.
//!
//! These are programmer or configuration errors. An unsafe statement is never
//! an error: it is a [`Rejection`](crate::Rejection) inside a
//! [`GuardDecision`](crate::GuardDecision).

use thiserror::Error;
use vista_core::ConfigError;

/// Errors that can occur while building or driving the guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Invalid guard configuration.
    #[error("invalid guard configuration: {0}")]
    Config(#[from] ConfigError),

    /// SQL tokenizing failed.
    #[error("failed to tokenize SQL: {0}")]
    Tokenize(String),

    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    Parse(String),
}
