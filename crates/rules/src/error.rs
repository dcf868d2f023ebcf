//! Error types for the rule engine.

use thiserror::Error;

/// Errors produced while loading, validating, or evaluating rules.
#[derive(Error, Debug)]
pub enum RuleError {
    /// Rule file could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rule set failed structural validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event name outside the supported set.
    #[error("Unsupported event: {0}")]
    UnsupportedEvent(String),

    /// Event payload is missing a required record.
    #[error("Payload error: {0}")]
    Payload(String),

    /// Template could not be parsed.
    #[error("Template error: {0}")]
    Template(String),
}

/// Result type alias using RuleError.
pub type RuleResult<T> = Result<T, RuleError>;
