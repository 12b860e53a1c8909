//! Error types for transaction building and parsing

use thiserror::Error;

/// Result type alias for builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by coin lookup, transaction builders and transactions
#[derive(Debug, Error)]
pub enum Error {
    /// A builder field is missing or failed validation
    #[error("Invalid or missing {field}, got: {reason}")]
    BuildTransaction { field: String, reason: String },

    /// Raw transaction could not be decoded
    #[error("Failed to parse {field}: {reason}")]
    ParseTransaction { field: String, reason: String },

    /// Instruction, transaction type or feature outside the known set
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Malformed private or public key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The same key already signed this transaction
    #[error("Duplicate signer: {0}")]
    DuplicateSigner(String),

    /// An injected signature does not verify against the signable payload
    #[error("Invalid signature for {0}")]
    InvalidSignature(String),

    /// Broadcast requested before every required signature was collected
    #[error("Transaction not fully signed: {collected} of {required} signatures")]
    NotFullySigned { collected: usize, required: usize },

    /// Mutation attempted after the broadcast encoding was produced
    #[error("Transaction is sealed")]
    Sealed,

    /// Coin name not present in the registry
    #[error("Unknown coin: {0}")]
    UnknownCoin(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn build(field: impl Into<String>, reason: impl ToString) -> Self {
        Error::BuildTransaction {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(field: impl Into<String>, reason: impl ToString) -> Self {
        Error::ParseTransaction {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Field name carried by build and parse errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::BuildTransaction { field, .. } | Error::ParseTransaction { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
