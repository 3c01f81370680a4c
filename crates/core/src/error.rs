//! Domain error model.

use thiserror::Error;

/// Result type used across the ledger crates.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation,
/// conflicts, sealed records). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An input precondition failed (e.g. non-positive quantity, blank
    /// document number, amount above the open balance).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Current state makes the mutation illegal (e.g. duplicate invoice
    /// number, stock would go negative, dependent records still exist).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The mutation would corrupt the store: a sealed record was touched,
    /// or arithmetic left the representable range.
    #[error("integrity: {0}")]
    Integrity(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }
}
