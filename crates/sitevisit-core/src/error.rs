//! Error types for the site-visit service.
//!
//! This module defines the central `Error` enum shared by the record stores,
//! the sequence source, the mirror client and the storage router.
//!
//! ## Error Cases
//! - `Validation`: A required field is missing or malformed. Raised before any
//!   storage attempt.
//! - `StoreUnavailable`: The durable store could not be reached or used. Almost
//!   always recovered locally by falling back to the ephemeral buffer.
//! - `NotFound`: No record with the requested primary key.
//! - `Conflict`: A customer ID is already taken. Drives ID regeneration.
//! - `Mirror`: The spreadsheet webhook write failed or timed out. Only ever
//!   logged and flagged.
//! - `Database` / `Serialization`: Unclassified driver or encoding failures.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the site-visit service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request body failed normalization.
    #[error("Invalid field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The durable store is unreachable, timed out, or lacks its schema.
    #[error("Store unavailable: {context}")]
    StoreUnavailable { context: String },

    /// No record with this primary key.
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// A record with this customer ID already exists.
    #[error("Customer ID already issued: {customer_id}")]
    Conflict { customer_id: String },

    /// The mirror endpoint rejected the write or could not be reached.
    #[error("Mirror write failed: {context}")]
    Mirror { context: String },

    /// Any other driver failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored detail blob could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(context: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
        }
    }
}
