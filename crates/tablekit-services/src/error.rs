use tablekit_core::TablekitError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
///
/// Schema-change verdicts are NOT errors — they come back inside result
/// objects. These are the orchestration failures around them.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("A table named '{0}' already exists for this user")]
    DuplicateTable(String),

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Identifier '{0}' contains characters that are not allowed")]
    InvalidIdentifier(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Metadata is corrupted: {0}")]
    MetadataCorrupted(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend error: {0}")]
    Backend(#[from] TablekitError),

    #[error("Table operation failed: {0}")]
    TableOperationFailed(String),
}
