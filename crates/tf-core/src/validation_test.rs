use super::*;

fn wip() -> Table {
    Table::from_rows(
        ["process_step", "status", "wip_qty"],
        vec![
            vec!["ETCH".into(), "IN_PROGRESS".into(), Value::Int(12)],
            vec!["LITHO".into(), "HOLD".into(), Value::Float(f64::NAN)],
            vec!["ETCH".into(), "SCRAPPED".into(), Value::Int(-3)],
            vec![Value::Null, "COMPLETED".into(), Value::Float(2.5)],
        ],
    )
    .unwrap()
}

#[test]
fn test_not_null_counts_nulls_and_nan() {
    let report = TableValidator::new(&wip())
        .check_not_null("process_step")
        .check_not_null("wip_qty")
        .check_not_null("status")
        .validate();

    assert_eq!(report.total_rows, 4);
    assert!(!report.passed());
    let counts: Vec<usize> = report.results.iter().map(|r| r.failed_count).collect();
    assert_eq!(counts, vec![1, 1, 0]);
    assert!(report.results[2].passed);
    assert!(report.results[2].message.is_empty());
}

#[test]
fn test_unique_reports_repeats_with_samples() {
    let report = TableValidator::new(&wip()).check_unique("process_step").validate();
    let result = &report.results[0];
    assert!(!result.passed);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.failed_samples, vec!["ETCH"]);
}

#[test]
fn test_range_skips_nulls() {
    let report = TableValidator::new(&wip())
        .check_range("wip_qty", Some(0.0), None)
        .check_range("wip_qty", None, Some(100.0))
        .validate();

    assert_eq!(report.results[0].failed_count, 1);
    assert_eq!(report.results[0].failed_samples, vec!["-3"]);
    assert!(report.results[1].passed);
}

#[test]
fn test_values_in_ignores_nulls() {
    let allowed: Vec<Value> = ["IN_PROGRESS", "COMPLETED", "HOLD"]
        .into_iter()
        .map(Value::from)
        .collect();
    let report = TableValidator::new(&wip())
        .check_values_in("status", &allowed)
        .validate();

    let result = &report.results[0];
    assert_eq!(result.kind, CheckKind::ValuesIn);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.failed_samples, vec!["SCRAPPED"]);
    assert_eq!(
        result.to_string(),
        "values_in(status): found 1 invalid values (e.g. SCRAPPED)"
    );
}

#[test]
fn test_row_count_bounds() {
    let table = wip();
    let report = TableValidator::new(&table)
        .check_row_count(Some(1), Some(10))
        .check_row_count(Some(5), None)
        .check_row_count(None, Some(3))
        .validate();

    let passed: Vec<bool> = report.results.iter().map(|r| r.passed).collect();
    assert_eq!(passed, vec![true, false, false]);
    assert_eq!(report.results[1].message, "row count 4 is less than minimum 5");
    assert_eq!(report.results[2].message, "row count 4 exceeds maximum 3");
}

#[test]
fn test_missing_column_fails_check() {
    let report = TableValidator::new(&wip()).check_not_null("lot_id").validate();
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.results[0].message, "column not found");
}

#[test]
fn test_empty_validator_passes() {
    let report = TableValidator::new(&Table::new(["x"])).validate();
    assert!(report.passed());
    assert_eq!(report.total_rows, 0);
}
