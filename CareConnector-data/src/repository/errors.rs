use std::sync::PoisonError;
use thiserror::Error;
use crate::database::DatabaseError;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conditional create hit an existing item
    #[error("Item with PK: {pk}, SK: {sk} already exists")]
    AlreadyExists { pk: String, sk: String },

    /// Item required by the operation does not exist
    #[error("Item not found: PK: {pk}, SK: {sk}")]
    NotFound { pk: String, sk: String },

    /// Condition expression evaluated to false
    #[error("Conditional check failed")]
    ConditionFailed,

    /// Provisioned throughput or request limit exceeded
    #[error("Throughput exceeded, please retry: {0}")]
    Throttled(String),

    /// The configured table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Batch requests still unprocessed after every retry
    #[error("{0} batch requests remained unprocessed after retries")]
    BatchIncomplete(usize),

    /// Attribute value could not be converted
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Backend configuration error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Any other storage backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Lock error
    #[error("Lock error: {0}")]
    Lock(String),
}

impl<T> From<PoisonError<T>> for RepositoryError {
    fn from(error: PoisonError<T>) -> Self {
        RepositoryError::Lock(error.to_string())
    }
}
