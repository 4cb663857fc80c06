//! Error types for tf-db

use thiserror::Error;
use tf_core::CoreError;

/// Database, upsert and stage execution errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Mutex poisoned (D004)
    #[error("[D004] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// A table or column name that cannot be used as a bare SQL identifier (D005)
    #[error("[D005] Invalid SQL identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Key column absent from the batch being written (D006)
    #[error("[D006] Key column '{column}' is not present in the batch for {table}")]
    MissingKeyColumn { column: String, table: String },

    /// Upsert requested without key columns (D007)
    #[error("[D007] No key columns configured for {table}")]
    EmptyKeyColumns { table: String },

    /// Operation exceeded its time limit (D008)
    #[error("[D008] {operation} timed out after {seconds:.1}s")]
    Timeout { operation: String, seconds: f64 },

    /// A stage could not be executed with the inputs it was given (D009)
    #[error("[D009] Stage {stage} cannot run: {message}")]
    StageInput { stage: String, message: String },

    /// Configuration, storage or transform failure from tf-core (D010)
    #[error("[D010] {0}")]
    Core(#[from] CoreError),

    /// Internal error (D011)
    #[error("[D011] Internal database error: {0}")]
    Internal(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants; classify by message.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DbError::MutexPoisoned(err.to_string())
    }
}
