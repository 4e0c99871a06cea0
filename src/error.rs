//! Error types for the scoring engine.
//!
//! This module provides structured error handling with:
//! - `ScoringError`: top-level errors surfaced to the engine's caller
//! - `LlmError`: failures of the external model collaborator
//! - `RuleError`: failures raised inside a single scoring rule
//! - `StoreError`: persistence collaborator failures
//! - `ConfigError`: invalid or unreadable configuration
//! - `Result<T>`: Type alias for Results using ScoringError

use thiserror::Error;

// ============================================================================
// TOP-LEVEL ERROR TYPE
// ============================================================================

/// Errors that escape a page or domain run.
///
/// Almost everything inside a run degrades instead of failing; only inputs that
/// make scoring impossible end up here.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Invalid or malformed page URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid domain name for a domain analysis
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// Configuration rejected by validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistence failure on a path where the stored value is the result
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScoringError {
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }
}

/// Result type alias using ScoringError.
pub type Result<T> = std::result::Result<T, ScoringError>;

// ============================================================================
// LLM COLLABORATOR ERRORS
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// A single attempt exceeded the configured timeout
    #[error("LLM call timed out after {0}s")]
    Timeout(u64),

    /// Network-level failure (connect, TLS, body read)
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// Provider returned a non-success status
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Provider answered but without any text candidate
    #[error("LLM response contained no text")]
    EmptyResponse,

    /// No credentials or endpoint configured for the provider
    #[error("LLM provider not configured: {0}")]
    NotConfigured(&'static str),

    /// The collaborator is switched off for this process
    #[error("LLM calls are disabled")]
    Disabled,
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Transport(_) | LlmError::EmptyResponse => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::NotConfigured(_) | LlmError::Disabled => false,
        }
    }
}

// ============================================================================
// RULE ERRORS
// ============================================================================

/// Raised from `Rule::evaluate`; converted into a zero-score result at the
/// per-rule boundary and never propagated further.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("LLM collaborator failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Rule input invalid: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Internal(String),
}

// ============================================================================
// PERSISTENCE ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    Conflict(String),

    /// Used by stores that reject writes (tests, read-only deployments)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value `{field}`: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(LlmError::Api { status: 429, body: String::new() }.is_transient());
        assert!(LlmError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!LlmError::Disabled.is_transient());
        assert!(LlmError::Timeout(30).is_transient());
    }

    #[test]
    fn rule_error_wraps_llm_error_message() {
        let err: RuleError = LlmError::Timeout(5).into();
        assert_eq!(err.to_string(), "LLM collaborator failed: LLM call timed out after 5s");
    }
}
