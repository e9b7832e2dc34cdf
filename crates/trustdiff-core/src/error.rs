use std::time::Duration;
use thiserror::Error;

/// Result type alias for trustdiff operations
pub type Result<T> = std::result::Result<T, TrustDiffError>;

/// Errors that can occur while synchronizing or comparing certificate catalogs
#[derive(Error, Debug)]
pub enum TrustDiffError {
    /// HTTP request failed before a response was received
    #[error("transport error: {0}")]
    Transport(String),

    /// Rate limit exceeded
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-provided delay before retrying, if any
        retry_after: Option<Duration>,
    },

    /// Server responded with a 5xx status
    #[error("server error ({status})")]
    Server {
        /// HTTP status code
        status: u16,
        /// Server-provided delay before retrying, if any
        retry_after: Option<Duration>,
    },

    /// Server responded with a non-retryable 4xx status
    #[error("client error ({status})")]
    Client {
        /// HTTP status code
        status: u16,
    },

    /// Payload could not be parsed as a certificate
    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    /// Inclusion report is missing required columns
    #[error("report is missing required columns: {}", missing.join(", "))]
    Schema {
        /// Names of the absent columns
        missing: Vec<String>,
    },

    /// A refresh produced nothing worth persisting
    #[error("{0}")]
    EmptyResult(String),

    /// Cache store read/write failed
    #[error("cache error: {0}")]
    Cache(String),

    /// A certificate source could not be read
    #[error("source '{source_name}' unavailable: {reason}")]
    Source {
        /// Display label of the source
        source_name: String,
        /// Why it could not be read
        reason: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrustDiffError {
    /// Returns true if a later attempt of the same request may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }

    /// Returns true if the operation was cancelled rather than failed
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Server-provided retry hint, when the response carried one
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error came from a response
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } | Self::Client { status } => Some(*status),
            _ => None,
        }
    }

    /// Build a source error from any displayable cause
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Source {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
