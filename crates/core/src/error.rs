//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Messages name
/// the offending entity by its human-readable name, not its raw identifier.
/// Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An event, product, or inventory row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target exists but its state forbids the operation (closed event,
    /// inactive product or row, duplicate active row, derived cost edit).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// One or more input problems, reported together.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A decrement asked for more units than are on hand.
    #[error("insufficient stock of \"{product}\": requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Fieldless discriminant of [`DomainError`], for callers that branch on the
/// failure class (status mapping, metrics labels).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    InsufficientStock,
    InvalidId,
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(vec![msg.into()])
    }

    /// Build a validation error from several problems at once.
    pub fn validation_all(problems: Vec<String>) -> Self {
        Self::Validation(problems)
    }

    pub fn insufficient_stock(product: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            product: product.into(),
            requested,
            available,
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::InvalidState(_) => ErrorKind::InvalidState,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::InvalidId(_) => ErrorKind::InvalidId,
        }
    }
}
