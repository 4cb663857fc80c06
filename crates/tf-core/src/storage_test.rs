use super::*;
use crate::table::Value;
use tempfile::TempDir;

fn pipeline() -> PipelineName {
    PipelineName::try_new("lot_history").unwrap()
}

fn sample() -> Table {
    Table::from_rows(
        ["lot_id", "quantity"],
        vec![vec!["L1".into(), Value::Int(3)], vec!["L'2".into(), Value::Null]],
    )
    .unwrap()
}

#[test]
fn test_key_layout() {
    let partitioned = StorageKey::new(
        "tenant_id=acme",
        StageKind::Extract,
        pipeline(),
        Some(PartitionKey::parse("2024-06-01").unwrap()),
    );
    assert_eq!(
        partitioned.path(),
        "tenant_id=acme/extract/job_name=lot_history/date=20240601/data.json"
    );

    let latest = StorageKey::new("tenant_id=acme", StageKind::Transfer, pipeline(), None);
    assert_eq!(
        latest.path(),
        "tenant_id=acme/transfer/job_name=lot_history/latest/data.json"
    );
}

#[test]
fn test_memory_store_roundtrip_and_overwrite() {
    let store = MemoryObjectStore::new();
    let key = StorageKey::new("t", StageKind::Extract, pipeline(), None);

    let path = store.write(&sample(), &key).unwrap();
    assert_eq!(store.read(&path).unwrap(), sample());

    let empty = Table::new(["lot_id", "quantity"]);
    let again = store.write(&empty, &key).unwrap();
    assert_eq!(again, path);
    assert!(store.read(&path).unwrap().is_empty());
    assert_eq!(store.paths().len(), 1);
}

#[test]
fn test_memory_store_missing_object() {
    let store = MemoryObjectStore::new();
    assert!(matches!(
        store.read("nope/data.json"),
        Err(CoreError::Storage { .. })
    ));
}

#[test]
fn test_local_store_writes_json_files() {
    let dir = TempDir::new().unwrap();
    let store = LocalObjectStore::new(dir.path());
    let key = StorageKey::new(
        "tenant_id=acme",
        StageKind::Load,
        pipeline(),
        Some(PartitionKey::parse("2024-06-01").unwrap()),
    );

    let path = store.write(&sample(), &key).unwrap();
    assert_eq!(path, store.locate(&key));
    assert!(std::path::Path::new(&path).is_file());
    assert!(path.ends_with("date=20240601/data.json"));
    assert_eq!(store.read(&path).unwrap(), sample());
}

#[test]
fn test_local_store_read_error() {
    let dir = TempDir::new().unwrap();
    let store = LocalObjectStore::new(dir.path());
    let bogus = dir.path().join("bogus.json");
    std::fs::write(&bogus, "not json").unwrap();
    assert!(store.read(&bogus.display().to_string()).is_err());
}

#[test]
fn test_local_store_roundtrips_non_finite_floats() {
    let dir = TempDir::new().unwrap();
    let store = LocalObjectStore::new(dir.path());
    let key = StorageKey::new("tenant_id=acme", StageKind::Extract, pipeline(), None);
    let table = Table::from_rows(
        ["lot_id", "yield"],
        vec![
            vec!["L1".into(), Value::Float(f64::NAN)],
            vec!["L2".into(), Value::Float(f64::INFINITY)],
            vec!["L3".into(), Value::Float(0.75)],
        ],
    )
    .unwrap();

    let path = store.write(&table, &key).unwrap();
    let back = store.read(&path).unwrap();

    assert_eq!(back.len(), 3);
    assert!(back.get(0, "yield").is_some_and(Value::is_null));
    assert_eq!(back.get(1, "yield"), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(back.get(2, "yield"), Some(&Value::Float(0.75)));
}

#[test]
fn test_local_store_rejects_ragged_object() {
    let dir = TempDir::new().unwrap();
    let store = LocalObjectStore::new(dir.path());
    let ragged = dir.path().join("ragged.json");
    std::fs::write(
        &ragged,
        r#"{"columns":["lot_id","quantity"],"rows":[[{"type":"text","value":"L1"}]]}"#,
    )
    .unwrap();

    let err = store.read(&ragged.display().to_string()).unwrap_err();
    assert!(matches!(err, CoreError::Storage { .. }), "{err}");
}
