//! Errors surfaced by the inventory service and its storage backends.

use thiserror::Error;

use eventory_core::{DomainError, ErrorKind};

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Deterministic business failure (not found, invalid state, validation,
    /// insufficient stock).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The storage backend failed (connection, lock poisoning, bad row).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Business failure class, or `None` for storage failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            InventoryError::Domain(e) => Some(e.kind()),
            InventoryError::Storage(_) => None,
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            InventoryError::Domain(e) => Some(e),
            InventoryError::Storage(_) => None,
        }
    }
}
