//! tf-db - Database layer for tenantflow
//!
//! This crate provides the `Database` trait with a DuckDB implementation,
//! the idempotent key-based upsert engine, and the runner that executes
//! the stage nodes of a tenant's pipeline graph.

pub mod duckdb;
pub mod error;
pub mod runner;
pub mod sql;
pub mod traits;
pub mod upsert;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use runner::{StageOutput, StageRun, StageRunner};
pub use traits::Database;
pub use upsert::{BatchWriteResult, UpsertEngine, UpsertOptions, DEFAULT_BATCH_SIZE};
