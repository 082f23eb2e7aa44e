//! Shared error taxonomy for the hosting stack.
//!
//! One structured error type flows through every crate. Each variant carries
//! a transport status code and a kebab-cased class name so server adapters
//! can serialize failures without inspecting variants, while library code
//! matches on the variants themselves.

use thiserror::Error;

/// Result type for hosting operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur across the hosting stack.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMedia { content_type: String },

    #[error("Quota exceeded for {bucket}: requested {requested}, {remaining} remaining")]
    QuotaExceeded {
        bucket: String,
        requested: u64,
        remaining: u64,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage backend error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl HostError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-media error.
    pub fn unsupported_media(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMedia {
            content_type: content_type.into(),
        }
    }

    /// Create a quota-exceeded error.
    pub fn quota_exceeded(bucket: impl Into<String>, requested: u64, remaining: u64) -> Self {
        Self::QuotaExceeded {
            bucket: bucket.into(),
            requested,
            remaining,
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Create a configuration error. Treated as fatal misconfiguration, not
    /// a user error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a storage error with no underlying cause.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error wrapping a backend failure.
    pub fn storage_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::UnsupportedMedia { .. } | Self::QuotaExceeded { .. } => 400,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Configuration(_) | Self::Storage { .. } | Self::Serialization { .. } => 500,
        }
    }

    /// Kebab-cased class name for transport payloads.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnsupportedMedia { .. } => "unsupported-media",
            Self::QuotaExceeded { .. } => "quota-exceeded",
            Self::NotFound(_) => "not-found",
            Self::Authorization(_) => "authorization",
            Self::Configuration(_) => "configuration",
            Self::Storage { .. } => "storage",
            Self::Serialization { .. } => "serialization",
        }
    }
}
