//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// One variant per failure class callers are expected to react to differently.
/// Store failures that are not constraint violations surface as [`DomainError::Storage`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A file or resource does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// A document (price-list feed, request body) is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The caller's account type or ownership does not allow the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// One-shop-per-user violation.
    #[error("ownership conflict: {0}")]
    OwnershipConflict(String),

    /// Missing or malformed required fields.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Uniqueness / foreign-key violation surfaced from the store.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Order status change not allowed by the state machine.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Backend failure (I/O, connection, timeout).
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn ownership_conflict(msg: impl Into<String>) -> Self {
        Self::OwnershipConflict(msg.into())
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable machine-readable code (used in API error bodies).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Parse(_) => "parse_error",
            Self::PermissionDenied(_) => "permission_denied",
            Self::OwnershipConflict(_) => "ownership_conflict",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
