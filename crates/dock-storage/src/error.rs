use thiserror::Error;

/// Errors raised while persisting station values.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored value does not fit the expected range
    #[error("Invalid value for key '{key}': {value}")]
    InvalidValue { key: String, value: i64 },
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
