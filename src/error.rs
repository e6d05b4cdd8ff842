use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors returned by ledger, history, catalog and directory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Requested quantity is not a finite, non-negative number
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Product, provider or user does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Actor's role lacks the capability the operation needs
    #[error("Permission denied: {role} cannot {action}")]
    PermissionDenied {
        /// Role of the actor that was denied
        role: String,
        /// Human readable capability name
        action: String,
    },

    /// Product changed since the caller read it
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Scanned or typed code matched no product
    #[error("No product matches code '{0}'")]
    DecodeMiss(String),

    /// Required field missing or malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Destructive operation issued without explicit confirmation
    #[error("Confirmation required to {0}")]
    ConfirmationRequired(String),
}

pub type Result<T, E = InventoryError> = std::result::Result<T, E>;

impl From<rusqlite::Error> for InventoryError {
    fn from(e: rusqlite::Error) -> Self {
        InventoryError::StorageUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(e: std::io::Error) -> Self {
        InventoryError::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(e: serde_json::Error) -> Self {
        InventoryError::Validation(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for InventoryError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        InventoryError::StorageUnavailable(e.to_string())
    }
}

// Commands hand errors to the web view as plain messages.
impl Serialize for InventoryError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
