//! Server-facing error taxonomy for ruthd (spec.md §7).
//!
//! Scoped separately from `ruth_core::Error`, matching the teacher's
//! per-crate `Error` enum convention (`StorageError`, `EventLogError`,
//! `ServerError`, `MembershipError` each scoped to their own module rather
//! than one monolithic enum).

use thiserror::Error;

/// Rejection category surfaced by the gatekeeper (spec.md §4.4 step 5).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("signature verification failed")]
    SignatureFail,
    #[error("attestation nonce did not match the signed payload")]
    NonceMismatch,
    #[error("device integrity verdict did not pass the configured threshold")]
    IntegrityFail,
    #[error("attestation verdict oracle was unreachable or timed out")]
    VerdictUnreachable,
}

/// Errors surfaced by ruthd's storage, collector, and server layers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("core error: {0}")]
    Core(#[from] ruth_core::error::Error),

    #[error("update rejected: {0}")]
    Rejected(RejectReason),

    #[error("server is shutting down")]
    Shutdown,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("device not registered: {0}")]
    UnknownDevice(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
