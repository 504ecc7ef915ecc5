use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use shopdocs_core::DomainError;

use crate::store::{StoreError, constraints};

/// What callers of the document services see.
///
/// Domain failures pass through unchanged in meaning. Store failures are
/// translated: conversion-source unique violations become `AlreadyConverted`,
/// version mismatches become `Conflict`, and anything unexpected is logged in
/// full and surfaced only as an opaque reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    #[error("{message} (current status: {status})")]
    InvalidState { status: String, message: String },

    #[error("document has no line items")]
    EmptyDocument,

    #[error("quotation expired at {valid_until}")]
    Expired { valid_until: DateTime<Utc> },

    #[error("source document has already been converted to an invoice")]
    AlreadyConverted,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{operation} did not complete within {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("internal error (reference {reference})")]
    Internal { reference: Uuid },
}

impl ServiceError {
    /// Log `detail` with a fresh correlation reference and hide it from the caller.
    pub fn internal(detail: impl core::fmt::Display) -> Self {
        let reference = Uuid::now_v7();
        error!(%reference, error = %detail, "internal error");
        ServiceError::Internal { reference }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound => "not_found",
            ServiceError::InvalidState { .. } => "invalid_state",
            ServiceError::EmptyDocument => "empty_document",
            ServiceError::Expired { .. } => "expired",
            ServiceError::AlreadyConverted => "already_converted",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Timeout { .. } => "timeout",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidState { status, message } => {
                ServiceError::InvalidState { status, message }
            }
            DomainError::NotFound => ServiceError::NotFound,
            DomainError::EmptyDocument => ServiceError::EmptyDocument,
            DomainError::Expired { valid_until } => ServiceError::Expired { valid_until },
            DomainError::AlreadyConverted => ServiceError::AlreadyConverted,
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation { constraint }
                if constraints::is_conversion_source(&constraint) =>
            {
                ServiceError::AlreadyConverted
            }
            StoreError::UniqueViolation { constraint } => {
                ServiceError::Conflict(format!("unique constraint {constraint} violated"))
            }
            StoreError::Concurrency(msg) => ServiceError::Conflict(msg),
            StoreError::Missing(_) => ServiceError::NotFound,
            StoreError::Backend(msg) => ServiceError::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_unique_violation_is_already_converted() {
        let err: ServiceError = StoreError::unique(constraints::INVOICE_SOURCE_QUOTATION).into();
        assert_eq!(err, ServiceError::AlreadyConverted);
        let err: ServiceError = StoreError::unique(constraints::INVOICE_SOURCE_WORK_ORDER).into();
        assert_eq!(err, ServiceError::AlreadyConverted);
    }

    #[test]
    fn backend_failures_are_opaque() {
        let err: ServiceError = StoreError::Backend("password authentication failed".into()).into();
        assert!(matches!(err, ServiceError::Internal { .. }));
        assert!(!err.to_string().contains("password"));
    }

    #[test]
    fn invalid_state_keeps_current_status() {
        let err: ServiceError =
            DomainError::invalid_state("approved", "quotation can no longer be edited").into();
        assert_eq!(err.code(), "invalid_state");
        assert!(err.to_string().contains("approved"));
    }
}
