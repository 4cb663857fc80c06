use super::*;
use chrono::NaiveDate;

#[tokio::test]
async fn test_in_memory() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert_eq!(db.db_type(), "duckdb");
}

#[tokio::test]
async fn test_new_accepts_memory_marker() {
    assert!(DuckDbBackend::new(":memory:").is_ok());
    assert!(DuckDbBackend::new("").is_ok());
}

#[tokio::test]
async fn test_file_backed_database_persists() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("target.duckdb");
    {
        let db = DuckDbBackend::from_path(&path).unwrap();
        db.execute_batch("CREATE TABLE t (id INT); INSERT INTO t VALUES (1), (2);")
            .await
            .unwrap();
    }
    let db = DuckDbBackend::new(path.to_str().unwrap()).unwrap();
    assert_eq!(db.query_count("SELECT * FROM t").await.unwrap(), 2);
}

#[tokio::test]
async fn test_query_count() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE nums AS SELECT * FROM range(10) t(n)")
        .await
        .unwrap();

    let count = db.query_count("SELECT * FROM nums").await.unwrap();
    assert_eq!(count, 10);
}

#[tokio::test]
async fn test_execute_returns_affected_rows() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (id INT); INSERT INTO t VALUES (1), (2), (3);")
        .await
        .unwrap();

    assert_eq!(db.execute("DELETE FROM t WHERE id >= 2").await.unwrap(), 2);
    assert_eq!(db.execute("DELETE FROM t WHERE id = 99").await.unwrap(), 0);
}

#[tokio::test]
async fn test_query_table_converts_types() {
    let db = DuckDbBackend::in_memory().unwrap();
    let table = db
        .query_table(
            "SELECT 1::INTEGER AS i, 2.5::DOUBLE AS f, 'it''s' AS s, TRUE AS b, \
             DATE '2024-06-01' AS d, TIMESTAMP '2024-06-01 08:30:00' AS ts, NULL AS n",
        )
        .await
        .unwrap();

    assert_eq!(table.columns(), &["i", "f", "s", "b", "d", "ts", "n"]);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "i"), Some(&Value::Int(1)));
    assert_eq!(table.get(0, "f"), Some(&Value::Float(2.5)));
    assert_eq!(table.get(0, "s"), Some(&Value::from("it's")));
    assert_eq!(table.get(0, "b"), Some(&Value::Bool(true)));
    assert_eq!(
        table.get(0, "d"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()))
    );
    assert_eq!(table.get(0, "ts"), Some(&Value::from("2024-06-01 08:30:00")));
    assert_eq!(table.get(0, "n"), Some(&Value::Null));
}

#[tokio::test]
async fn test_query_table_empty_result_keeps_columns() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (lot_id VARCHAR, qty BIGINT)")
        .await
        .unwrap();

    let table = db.query_table("SELECT * FROM t").await.unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns(), &["lot_id", "qty"]);
}

#[tokio::test]
async fn test_query_table_reports_missing_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = db.query_table("SELECT * FROM missing").await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)), "{err}");
}

#[tokio::test]
async fn test_relation_exists_with_schema() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.create_schema_if_not_exists("aps").await.unwrap();
    db.execute_batch("CREATE TABLE aps.lot_snapshot (lot_id VARCHAR)")
        .await
        .unwrap();

    assert!(db.relation_exists("aps.lot_snapshot").await.unwrap());
    assert!(!db.relation_exists("lot_snapshot").await.unwrap());
    assert!(!db.relation_exists("aps.o'brien").await.unwrap());
}

#[tokio::test]
async fn test_drop_if_exists() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE to_drop AS SELECT 1 AS id")
        .await
        .unwrap();
    assert!(db.relation_exists("to_drop").await.unwrap());

    db.drop_if_exists("to_drop").await.unwrap();
    assert!(!db.relation_exists("to_drop").await.unwrap());
}

#[tokio::test]
async fn test_execute_transaction_commits_all_statements() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (id INTEGER)").await.unwrap();

    let affected = db
        .execute_transaction(&["INSERT INTO t VALUES (1), (2)", "DELETE FROM t WHERE id = 1"])
        .await
        .unwrap();
    assert_eq!(affected, vec![2, 1]);
    assert_eq!(db.query_count("SELECT * FROM t").await.unwrap(), 1);
}

#[tokio::test]
async fn test_execute_transaction_rolls_back_on_failure() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1)")
        .await
        .unwrap();

    let err = db
        .execute_transaction(&["DELETE FROM t", "INSERT INTO t VALUES ('not a number')"])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ExecutionError(_)), "{err}");
    assert_eq!(db.query_count("SELECT * FROM t").await.unwrap(), 1);

    // The connection is usable again and not left inside a transaction
    db.execute_transaction(&["INSERT INTO t VALUES (2)"])
        .await
        .unwrap();
    assert_eq!(db.query_count("SELECT * FROM t").await.unwrap(), 2);
}
