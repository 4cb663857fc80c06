//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use tf_core::Table;

/// Database abstraction used for both the source and the target side of a
/// tenant's pipelines.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute SQL that modifies data, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Execute `statements` in one transaction, returning the affected rows
    /// of each. Either every statement commits or none does, and no other
    /// caller's statements run inside the transaction.
    async fn execute_transaction(&self, statements: &[&str]) -> DbResult<Vec<usize>>;

    /// Run a query and collect its result set
    async fn query_table(&self, sql: &str) -> DbResult<Table>;

    /// Execute query returning row count
    async fn query_count(&self, sql: &str) -> DbResult<usize>;

    /// Check if a table or view exists; `name` may be schema-qualified
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Drop a table or view if it exists
    async fn drop_if_exists(&self, name: &str) -> DbResult<()>;

    /// Create a schema if it does not exist
    async fn create_schema_if_not_exists(&self, schema: &str) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
