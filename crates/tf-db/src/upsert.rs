//! Idempotent upsert by key columns
//!
//! A batch is written by deleting every target row whose key columns match
//! a row of the batch and then inserting the batch. Running the same batch
//! twice leaves the target with exactly one copy of it.
//!
//! Large batches are split into sub-batches of [`UpsertOptions::batch_size`]
//! rows, each deleted then inserted before the next starts. A key repeated
//! in two sub-batches therefore keeps only the later sub-batch's rows.
//! Unless [`UpsertOptions::transactional`] is set, a failure between the
//! delete and the insert of a sub-batch leaves its keys absent until the
//! next successful run.

use crate::error::{DbError, DbResult};
use crate::sql::{key_predicate, qualified_name, render_value, validate_identifier};
use crate::traits::Database;
use serde::Serialize;
use std::collections::HashSet;
use tf_core::{TargetTable, Table, Value};

/// Rows per DELETE / INSERT statement
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOptions {
    pub batch_size: usize,
    /// Wrap the delete and insert of each sub-batch in one transaction
    pub transactional: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transactional: false,
        }
    }
}

/// Rows affected by one upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchWriteResult {
    pub deleted: usize,
    pub inserted: usize,
}

/// Writes batches into target tables
pub struct UpsertEngine<'a> {
    db: &'a dyn Database,
    options: UpsertOptions,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self::with_options(db, UpsertOptions::default())
    }

    pub fn with_options(db: &'a dyn Database, options: UpsertOptions) -> Self {
        Self { db, options }
    }

    pub fn options(&self) -> UpsertOptions {
        self.options
    }

    fn chunk_size(&self) -> usize {
        self.options.batch_size.max(1)
    }

    /// Replace the rows of `target` keyed like the rows of `batch`.
    ///
    /// An empty batch returns `{0, 0}` without validation or database I/O.
    pub async fn upsert(
        &self,
        batch: &Table,
        target: &TargetTable,
        key_columns: &[String],
    ) -> DbResult<BatchWriteResult> {
        if batch.is_empty() {
            return Ok(BatchWriteResult::default());
        }
        let table = qualified_name(target)?;
        validate_columns(batch)?;
        let key_indexes = key_indexes(batch, key_columns, &table)?;

        let mut total = BatchWriteResult::default();
        for chunk in batch.rows().chunks(self.chunk_size()) {
            let delete = delete_statement(chunk, key_columns, &key_indexes, &table);
            let insert = insert_statement(chunk, batch.columns(), &table);
            let written = if self.options.transactional {
                self.write_in_transaction(&delete, &insert).await?
            } else {
                self.write(&delete, &insert).await?
            };
            total.deleted += written.deleted;
            total.inserted += written.inserted;
        }
        log::debug!(
            "Upsert into {}: {} deleted, {} inserted",
            table,
            total.deleted,
            total.inserted
        );
        Ok(total)
    }

    /// Append `batch` without deleting anything
    pub async fn insert(&self, batch: &Table, target: &TargetTable) -> DbResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let table = qualified_name(target)?;
        validate_columns(batch)?;
        let mut inserted = 0;
        for chunk in batch.rows().chunks(self.chunk_size()) {
            inserted += self
                .db
                .execute(&insert_statement(chunk, batch.columns(), &table))
                .await?;
        }
        Ok(inserted)
    }

    /// Delete every row of `target`
    pub async fn truncate(&self, target: &TargetTable) -> DbResult<usize> {
        let table = qualified_name(target)?;
        self.db.execute(&format!("DELETE FROM {table}")).await
    }

    /// Create `target` with columns typed after `batch` when it does not
    /// exist yet; returns whether it was created.
    pub async fn ensure_table(&self, batch: &Table, target: &TargetTable) -> DbResult<bool> {
        let table = qualified_name(target)?;
        validate_columns(batch)?;
        if self.db.relation_exists(&table).await? {
            return Ok(false);
        }
        let schema = match &target.catalog {
            Some(catalog) => format!("{}.{}", catalog, target.schema),
            None => target.schema.clone(),
        };
        self.db.create_schema_if_not_exists(&schema).await?;

        let columns: Vec<String> = batch
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("{} {}", name, column_type(batch, idx)))
            .collect();
        self.db
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                table,
                columns.join(", ")
            ))
            .await?;
        log::info!("Created target table {}", table);
        Ok(true)
    }

    async fn write(&self, delete: &str, insert: &str) -> DbResult<BatchWriteResult> {
        let deleted = self.db.execute(delete).await?;
        let inserted = self.db.execute(insert).await?;
        Ok(BatchWriteResult { deleted, inserted })
    }

    async fn write_in_transaction(
        &self,
        delete: &str,
        insert: &str,
    ) -> DbResult<BatchWriteResult> {
        match self.db.execute_transaction(&[delete, insert]).await?.as_slice() {
            [deleted, inserted] => Ok(BatchWriteResult {
                deleted: *deleted,
                inserted: *inserted,
            }),
            other => Err(DbError::Internal(format!(
                "transaction returned {} results for 2 statements",
                other.len()
            ))),
        }
    }
}

/// One DELETE matching any row of `rows` on every key column
fn delete_statement(
    rows: &[Vec<Value>],
    key_columns: &[String],
    key_indexes: &[usize],
    table: &str,
) -> String {
    let mut seen = HashSet::new();
    let predicates: Vec<String> = rows
        .iter()
        .map(|row| {
            let conditions: Vec<String> = key_columns
                .iter()
                .zip(key_indexes)
                .map(|(column, &idx)| key_predicate(column, &row[idx]))
                .collect();
            format!("({})", conditions.join(" AND "))
        })
        .filter(|predicate| seen.insert(predicate.clone()))
        .collect();
    format!("DELETE FROM {} WHERE {}", table, predicates.join(" OR "))
}

fn insert_statement(rows: &[Vec<Value>], columns: &[String], table: &str) -> String {
    let values: Vec<String> = rows
        .iter()
        .map(|row| {
            let rendered: Vec<String> = row.iter().map(render_value).collect();
            format!("({})", rendered.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

fn validate_columns(batch: &Table) -> DbResult<()> {
    for column in batch.columns() {
        validate_identifier(column)?;
    }
    Ok(())
}

fn key_indexes(batch: &Table, key_columns: &[String], table: &str) -> DbResult<Vec<usize>> {
    if key_columns.is_empty() {
        return Err(DbError::EmptyKeyColumns {
            table: table.to_string(),
        });
    }
    key_columns
        .iter()
        .map(|column| {
            validate_identifier(column)?;
            batch
                .column_index(column)
                .ok_or_else(|| DbError::MissingKeyColumn {
                    column: column.clone(),
                    table: table.to_string(),
                })
        })
        .collect()
}

/// SQL type for a column, from its first non-null value
fn column_type(batch: &Table, idx: usize) -> &'static str {
    let first = batch
        .rows()
        .iter()
        .map(|row| &row[idx])
        .find(|value| !value.is_null());
    match first {
        Some(Value::Bool(_)) => "BOOLEAN",
        Some(Value::Int(_)) => "BIGINT",
        Some(Value::Float(_)) => "DOUBLE",
        Some(Value::Date(_)) => "DATE",
        _ => "VARCHAR",
    }
}

#[cfg(test)]
#[path = "upsert_test.rs"]
mod tests;
