//! Error types for lifecycle operations

use thiserror::Error;

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the lifecycle operations. The first two
/// are the caller's fault and are reported verbatim; the rest describe
/// backend or environment conditions.
#[derive(Debug, Error)]
pub enum Error {
    /// A required request field was absent
    #[error("{0} is required")]
    MissingParameter(&'static str),

    /// A supplied field was present but unusable
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The backend rejected the supplied shares during recovery
    #[error("recovery failed: {0}")]
    RecoveryFailed(String),

    /// The backend rejected the signing request
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The cryptographic backend is not installed or failed to load
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Encoding or decoding of a share or blob failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invariant violation inside the backend or the protocol
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is the caller's fault. Transports binding
    /// these operations map this to their 400 class.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingParameter(_) | Error::InvalidParameters(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidParameters(format!("invalid hex: {}", e))
    }
}
