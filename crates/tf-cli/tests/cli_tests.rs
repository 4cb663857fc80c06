//! End-to-end tests invoking the `tf` binary

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tf_db::{Database, DuckDbBackend};

const TENANTS: &str = "tests/fixtures/tenants";

/// Path to the compiled tf binary
fn tf_bin() -> String {
    env!("CARGO_BIN_EXE_tf").to_string()
}

/// Run a `tf` command against the fixture tenants and return
/// (stdout, stderr, exit code).
fn run_tf(args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(tf_bin())
        .args(["--tenants-dir", TENANTS])
        .args(args)
        .env_remove("TF_ENVIRONMENT")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute tf with args {:?}: {}", args, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

#[test]
fn test_tenants_json() {
    let (stdout, stderr, code) = run_tf(&["tenants", "--output", "json"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");

    let tenants: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let tenants = tenants.as_array().unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0]["id"], "acme");
    assert_eq!(tenants[0]["custom_code"], true);
    assert_eq!(tenants[1]["id"], "globex");
    assert_eq!(tenants[1]["default_pipelines"], true);
    assert_eq!(tenants[1]["pipelines"].as_array().unwrap().len(), 4);
}

#[test]
fn test_tenants_respects_environment() {
    let (stdout, _, code) = run_tf(&["tenants", "-o", "json", "-e", "prod"]);
    assert_eq!(code, Some(0));
    let tenants: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(tenants.as_array().unwrap().len(), 1);
}

#[test]
fn test_graph_json() {
    let (stdout, stderr, code) = run_tf(&["graph", "acme", "--output", "json"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");

    let graph: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(graph["tenant"], "acme");
    assert_eq!(graph["environment"], "dev");
    let ids: Vec<&str> = graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"acme/load/lot_history"));
    assert!(ids.contains(&"acme/extract/item_master"));
    assert_eq!(graph["schedules"][0]["cron"], "0 2 * * *");
}

#[test]
fn test_graph_table_lists_stages() {
    let (stdout, _, code) = run_tf(&["graph", "acme"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("STAGE"));
    assert!(stdout.contains("acme/transfer/lot_history"));
    assert!(stdout.contains("acme_daily_etl_job"));
}

#[test]
fn test_graph_unknown_tenant_fails() {
    let (_, stderr, code) = run_tf(&["graph", "initech"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("initech"), "stderr: {stderr}");
}

#[test]
fn test_validate_reports_broken_document() {
    let (stdout, _, code) = run_tf(&["validate"]);
    assert_eq!(code, Some(1));
    assert!(stdout.contains("broken"), "stdout: {stdout}");
    assert!(stdout.contains("ok: acme"));
    assert!(stdout.contains("Validation failed"));
}

#[test]
fn test_validate_single_tenant_passes() {
    let (stdout, _, code) = run_tf(&["validate", "--tenant", "acme", "--strict"]);
    assert_eq!(code, Some(0), "stdout: {stdout}");
    assert!(stdout.contains("Validation passed: 1 tenants"));
}

const SOURCE_DDL: &str = "
CREATE TABLE lot_history (
    lot_id VARCHAR, product_code VARCHAR, process_step VARCHAR, equipment_id VARCHAR,
    start_time TIMESTAMP, end_time TIMESTAMP, quantity INTEGER, status VARCHAR,
    created_at TIMESTAMP
);
INSERT INTO lot_history VALUES
    ('L1', 'P1', 'ETCH', 'EQ1', '2024-06-01 08:00:00', NULL, 100, 'IN_PROGRESS', '2024-06-01 08:00:00'),
    ('L2', 'P1', 'ETCH', 'EQ2', '2024-06-01 09:00:00', NULL, 50, 'COMPLETED', '2024-06-01 09:00:00'),
    ('L3', 'P2', 'DEPO', 'EQ1', '2024-06-01 11:00:00', NULL, 75, 'WAITING', '2024-06-01 11:00:00'),
    ('L4', 'P2', 'DEPO', 'EQ3', '2024-06-02 07:00:00', NULL, 20, 'IN_PROGRESS', '2024-06-02 07:00:00');
";

async fn create_source(path: &Path) {
    let db = DuckDbBackend::from_path(path).unwrap();
    db.execute_batch(SOURCE_DDL).await.unwrap();
}

#[tokio::test]
async fn test_run_daily_job_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.duckdb");
    let target = dir.path().join("target.duckdb");
    let storage = dir.path().join("storage");
    create_source(&source).await;

    let args = [
        "run",
        "acme",
        "--job",
        "daily_etl",
        "--date",
        "2024-06-01",
        "--source-db",
        source.to_str().unwrap(),
        "--target-db",
        target.to_str().unwrap(),
        "--storage-dir",
        storage.to_str().unwrap(),
        "--create-tables",
        "--output",
        "json",
    ];
    for _ in 0..2 {
        let (stdout, stderr, code) = run_tf(&args);
        assert_eq!(code, Some(0), "stderr: {stderr}");
        let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(results[0]["rows"], 3);
        assert_eq!(results[2]["rows"], 2);
    }

    assert!(storage
        .join("tenants/acme/transfer/job_name=lot_history/date=20240601/data.json")
        .is_file());

    let db = DuckDbBackend::from_path(&target).unwrap();
    let count = db
        .query_count("SELECT * FROM aps.lot_snapshot WHERE tenant_id = 'acme'")
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_run_daily_job_without_date_fails() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("missing.duckdb");
    let (_, stderr, code) = run_tf(&[
        "run",
        "acme",
        "--source-db",
        source.to_str().unwrap(),
        "--storage-dir",
        dir.path().to_str().unwrap(),
    ]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("partition"), "stderr: {stderr}");
}

#[test]
fn test_run_unknown_job_fails() {
    let (_, stderr, code) = run_tf(&["run", "acme", "--job", "nightly", "--source-db", ":memory:"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("acme_daily_etl_job"), "stderr: {stderr}");
}
