//! Error types for the Location Resolution Engine
//!
//! Provides structured error types for the geocode client, the tiered cache,
//! the hierarchy upsert path and the entity save path.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Upstream (Geocode Provider) Errors
    // =========================================================================
    #[error("Geocode provider timed out after {timeout:?}: {url}")]
    UpstreamTimeout { url: String, timeout: Duration },

    #[error("Geocode provider rate limit exceeded: {url}")]
    UpstreamRateLimited { url: String },

    #[error("Geocode provider returned HTTP {status}: {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("Geocode provider network error: {0}")]
    UpstreamNetwork(#[from] reqwest::Error),

    #[error("Geocode provider response could not be decoded: {0}")]
    UpstreamDecode(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("City selection is required")]
    LocationRequired,

    #[error("Location selection is incomplete: missing {field}")]
    IncompleteSelection { field: &'static str },

    #[error("A record with identifier {identifier} already exists for this tenant")]
    DuplicateIdentifier { identifier: String },

    #[error("Invalid value for {field}: {message}")]
    Validation { field: &'static str, message: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    #[error("Unique constraint violated: {constraint} = {value}")]
    ConstraintViolation { constraint: &'static str, value: String },

    #[error("Record not found: {kind}/{id}")]
    RecordNotFound { kind: &'static str, id: String },

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Form field a validation error belongs to, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::LocationRequired => Some("city_external_id"),
            Error::IncompleteSelection { field } => Some(field),
            Error::DuplicateIdentifier { .. } => Some("identifier"),
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Check if this error should be reported as a field-level validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::LocationRequired
                | Error::IncompleteSelection { .. }
                | Error::DuplicateIdentifier { .. }
                | Error::Validation { .. }
        )
    }

    /// Check if this error is transient
    ///
    /// Transient upstream failures heal on the next request because empty
    /// results are never cached.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::UpstreamTimeout { .. }
            | Error::UpstreamRateLimited { .. }
            | Error::UpstreamNetwork(_) => true,
            Error::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
