//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::sql::quote_literal;
use crate::traits::Database;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use std::path::Path;
use std::sync::Mutex;
use tf_core::{Table, Value};

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAY: i32 = 719_163;

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path.is_empty() || path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.conn.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.conn.lock()?;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    /// Holds the connection lock for the whole transaction; dropping an
    /// uncommitted transaction rolls it back.
    fn execute_transaction_sync(&self, statements: &[&str]) -> DbResult<Vec<usize>> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction().map_err(DbError::from)?;
        let mut affected = Vec::with_capacity(statements.len());
        for sql in statements {
            let rows = tx
                .execute(sql, [])
                .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))?;
            affected.push(rows);
        }
        tx.commit().map_err(DbError::from)?;
        Ok(affected)
    }

    fn query_count_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
                row.get(0)
            })
            .map_err(DbError::from)?;
        Ok(count.max(0) as usize)
    }

    /// Collect all rows first; DuckDB panics on `column_count()` before the
    /// statement has executed.
    fn query_table_sync(&self, sql: &str) -> DbResult<Table> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(sql).map_err(DbError::from)?;
        let rows: Vec<Vec<Value>> = stmt
            .query_map([], |row| {
                let col_count = row.as_ref().column_count();
                (0..col_count)
                    .map(|i| read_value(row, i))
                    .collect::<duckdb::Result<Vec<Value>>>()
            })
            .map_err(DbError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;

        let columns: Vec<String> = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).map_or("?".to_string(), |v| v.to_string()))
            .collect();

        Ok(Table::from_rows(columns, rows)?)
    }

    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.conn.lock()?;

        let (schema, table) = match name.rfind('.') {
            Some(pos) => {
                let qualifier = &name[..pos];
                // `catalog.schema.table` filters on the schema part only
                let schema = qualifier.rsplit('.').next().unwrap_or(qualifier);
                (schema, &name[pos + 1..])
            }
            None => ("main", name),
        };

        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
            quote_literal(schema),
            quote_literal(table)
        );

        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(DbError::from)?;

        Ok(count > 0)
    }
}

/// Convert one DuckDB cell into a [`Value`]
fn read_value(row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<Value> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i.into()),
        ValueRef::SmallInt(i) => Value::Int(i.into()),
        ValueRef::Int(i) => Value::Int(i.into()),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::UTinyInt(i) => Value::Int(i.into()),
        ValueRef::USmallInt(i) => Value::Int(i.into()),
        ValueRef::UInt(i) => Value::Int(i.into()),
        ValueRef::UBigInt(i) => {
            i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Int)
        }
        ValueRef::HugeInt(i) => {
            i64::try_from(i).map_or_else(|_| Value::Text(i.to_string()), Value::Int)
        }
        ValueRef::Float(f) => Value::Float(f.into()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAY)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map_or(Value::Null, Value::Date),
        ValueRef::Timestamp(unit, ts) => timestamp_text(unit, ts).map_or(Value::Null, Value::Text),
        _ => fallback_value(row, idx),
    };
    Ok(value)
}

fn timestamp_text(unit: TimeUnit, ts: i64) -> Option<String> {
    let micros = match unit {
        TimeUnit::Second => ts.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => ts.checked_mul(1_000)?,
        TimeUnit::Microsecond => ts,
        TimeUnit::Nanosecond => ts / 1_000,
    };
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

/// Decimals, intervals and nested types: try text, then a numeric view.
fn fallback_value(row: &duckdb::Row<'_>, idx: usize) -> Value {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Value::Text(s);
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return Value::Float(f);
    }
    Value::Null
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn execute_transaction(&self, statements: &[&str]) -> DbResult<Vec<usize>> {
        self.execute_transaction_sync(statements)
    }

    async fn query_table(&self, sql: &str) -> DbResult<Table> {
        self.query_table_sync(sql)
    }

    async fn query_count(&self, sql: &str) -> DbResult<usize> {
        self.query_count_sync(sql)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn drop_if_exists(&self, name: &str) -> DbResult<()> {
        // Dropping a table as a view (or the reverse) errors in DuckDB
        let _ = self.execute_sync(&format!("DROP VIEW IF EXISTS {}", name));
        let _ = self.execute_sync(&format!("DROP TABLE IF EXISTS {}", name));
        Ok(())
    }

    async fn create_schema_if_not_exists(&self, schema: &str) -> DbResult<()> {
        self.execute_sync(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))?;
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
