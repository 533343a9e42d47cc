//! Error types for Ruth core primitives

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Ruth core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,

    /// Invalid public key
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Seed set or noise shape is malformed (empty seed list, zero dimension)
    #[error("config error: {0}")]
    Config(String),

    /// Non-finite loss, scalar, or epsilon encountered
    #[error("numeric error: {0}")]
    Numeric(String),
}
