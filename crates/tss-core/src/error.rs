//! Error types for threshold EdDSA operations

use thiserror::Error;

/// Result type alias for TSS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during key generation, combination and signing
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed ceremony configuration (index, threshold, party count)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A peer share failed its consistency or commitment check
    #[error("Key combine failed: {0}")]
    KeyCombine(String),

    /// Round-level mismatch; the ceremony must be restarted from scratch
    #[error("Signing aborted: {0}")]
    SigningAborted(String),

    /// Aggregated signature failed verification
    #[error("Invalid signature")]
    InvalidSignature,

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    Derivation(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Timeout waiting for a counterpart share
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Ceremony was cancelled at a round boundary
    #[error("Ceremony cancelled")]
    Cancelled,

    /// Encrypt/decrypt of signing material failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Keychain storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Malformed curve point or scalar
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl Error {
    /// Whether the caller may start a fresh ceremony after this error.
    ///
    /// Key material failures are fatal: retrying with the same shares can
    /// never succeed and may indicate an active attack.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SigningAborted(_) | Error::Relay(_) | Error::Timeout(_) | Error::Cancelled
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
