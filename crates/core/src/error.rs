//! Domain error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// lifecycle rules, conversion guards). Storage concerns belong in infra.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed line item or payment amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not permitted in the document's current status.
    #[error("{message} (current status: {status})")]
    InvalidState { status: String, message: String },

    /// Entity absent or owned by another tenant. The two are indistinguishable.
    #[error("not found")]
    NotFound,

    /// Issuing or converting a document without line items.
    #[error("document has no line items")]
    EmptyDocument,

    /// Conversion attempted on a quotation past its validity window.
    #[error("quotation expired at {valid_until}")]
    Expired { valid_until: DateTime<Utc> },

    /// The source document already has an invoice.
    #[error("source document has already been converted to an invoice")]
    AlreadyConverted,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(status: impl core::fmt::Display, msg: impl Into<String>) -> Self {
        Self::InvalidState {
            status: status.to_string(),
            message: msg.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
