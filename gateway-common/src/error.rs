//! Error types for the assets gateway.

use thiserror::Error;

/// Result type alias using the gateway error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the assets gateway.
///
/// Every failure surfaced to a caller goes through this taxonomy; the
/// router maps each variant to a caller-visible outcome category via
/// [`Error::status_code`] and [`Error::category`]. Backend error
/// payloads are never carried verbatim: `Upstream` holds only an
/// opaque correlation id that is also written to the logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Credential absent, malformed, or rejected by the identity provider
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity provider could not be reached; distinct from a rejected
    /// credential so callers can tell "not allowed" from "could not check"
    #[error("Identity provider unavailable: {0}")]
    IdentityProviderUnavailable(String),

    /// Asset kind has no registered store adapter
    #[error("Unknown asset kind: {0}")]
    UnknownKind(String),

    /// Backend reports no such asset
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed payload rejected by the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure or 5xx from a backing service
    #[error("Upstream error (correlation {correlation})")]
    Upstream { correlation: String },

    /// Kind registered twice during composition; fatal, aborts startup
    #[error("Duplicate asset kind: {0}")]
    DuplicateKind(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::IdentityProviderUnavailable(_) => 503,
            Self::UnknownKind(_) | Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Upstream { .. } => 502,
            _ => 500,
        }
    }

    /// Stable machine-readable category for the error envelope.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::IdentityProviderUnavailable(_) => "identity_provider_unavailable",
            Self::UnknownKind(_) => "unknown_kind",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Upstream { .. } => "upstream_error",
            Self::DuplicateKind(_) => "duplicate_kind",
            Self::Config(_) => "config_error",
            _ => "internal_error",
        }
    }
}
