//! Error types for Truth Lens collaborators
//!
//! Provides:
//! - Distinct error types for each external collaborator
//! - Machine-readable error codes
//! - A transient/permanent split used by retry policies

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Store errors (7xxx)
    StoreError,

    // External service errors (8xxx)
    UpstreamError,
    CapabilityError,
    CapabilityTimeout,
    RetrievalError,
    LookupError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::StoreError => 7001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::CapabilityError => 8002,
            ErrorCode::CapabilityTimeout => 8003,
            ErrorCode::RetrievalError => 8004,
            ErrorCode::LookupError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Store errors
    #[error("Record store error: {message}")]
    Store { message: String },

    // External service errors
    #[error("Understanding capability error: {message}")]
    Capability { message: String },

    #[error("Understanding capability timeout after {timeout_ms}ms")]
    CapabilityTimeout { timeout_ms: u64 },

    #[error("Content retrieval error for {url}: {message}")]
    Retrieval { url: String, message: String },

    #[error("Source lookup error: {message}")]
    Lookup { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Store { .. } => ErrorCode::StoreError,
            AppError::Capability { .. } => ErrorCode::CapabilityError,
            AppError::CapabilityTimeout { .. } => ErrorCode::CapabilityTimeout,
            AppError::Retrieval { .. } => ErrorCode::RetrievalError,
            AppError::Lookup { .. } => ErrorCode::LookupError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::CapabilityTimeout { .. } | AppError::Lookup { .. } => true,
            AppError::Capability { .. } | AppError::Retrieval { .. } => true,
            AppError::HttpClient(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            _ => false,
        }
    }

    /// Whether this error originated in an external collaborator
    pub fn is_upstream(&self) -> bool {
        self.code().as_code() / 1000 == 8
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::Store {
            message: "write failed".into(),
        };
        assert_eq!(err.code(), ErrorCode::StoreError);
        assert_eq!(err.code().as_code(), 7001);
    }

    #[test]
    fn test_upstream_errors() {
        let err = AppError::Lookup {
            message: "quota exhausted".into(),
        };
        assert!(err.is_upstream());
        assert!(err.is_transient());

        let err = AppError::Configuration {
            message: "missing key".into(),
        };
        assert!(!err.is_upstream());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_retrieval_error_message() {
        let err = AppError::Retrieval {
            url: "https://example.com".into(),
            message: "empty body".into(),
        };
        assert_eq!(
            err.to_string(),
            "Content retrieval error for https://example.com: empty body"
        );
    }
}
