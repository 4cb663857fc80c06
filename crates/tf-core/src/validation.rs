//! Data-quality checks run by transforms on the tables they produce
//!
//! Checks never fail a stage. A [`ValidationReport`] collects one
//! [`CheckResult`] per rule and transforms log the failed ones as warnings.

use crate::table::{Table, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Number of offending values kept per failed check
const MAX_SAMPLES: usize = 5;

/// Kind of a data-quality rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    NotNull,
    Unique,
    Range,
    ValuesIn,
    RowCount,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::NotNull => "not_null",
            CheckKind::Unique => "unique",
            CheckKind::Range => "range",
            CheckKind::ValuesIn => "values_in",
            CheckKind::RowCount => "row_count",
        };
        f.write_str(name)
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub column: Option<String>,
    pub passed: bool,
    /// Empty when the check passed
    pub message: String,
    pub failed_count: usize,
    pub failed_samples: Vec<String>,
}

impl CheckResult {
    fn pass(kind: CheckKind, column: Option<&str>) -> Self {
        Self {
            kind,
            column: column.map(str::to_string),
            passed: true,
            message: String::new(),
            failed_count: 0,
            failed_samples: Vec::new(),
        }
    }

    fn fail(kind: CheckKind, column: Option<&str>, message: String, failed_count: usize) -> Self {
        Self {
            passed: false,
            message,
            failed_count,
            ..Self::pass(kind, column)
        }
    }

    fn with_samples(mut self, samples: Vec<String>) -> Self {
        self.failed_samples = samples;
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}({})", self.kind, column)?,
            None => write!(f, "{}", self.kind)?,
        }
        if !self.passed {
            write!(f, ": {}", self.message)?;
            if !self.failed_samples.is_empty() {
                write!(f, " (e.g. {})", self.failed_samples.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Every check run against one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_rows: usize,
    pub results: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Log each failed check as a warning prefixed with `context`
    pub fn warn_failures(&self, context: &str) {
        for failure in self.failures() {
            log::warn!("[{}] Validation warning: {}", context, failure);
        }
    }
}

/// Builder that accumulates checks over a table
pub struct TableValidator<'a> {
    table: &'a Table,
    results: Vec<CheckResult>,
}

impl<'a> TableValidator<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            results: Vec::new(),
        }
    }

    /// No null (or NaN) values in `column`
    pub fn check_not_null(self, column: &str) -> Self {
        self.column_check(CheckKind::NotNull, column, |values| {
            let nulls = values.filter(|v| v.is_null()).count();
            if nulls == 0 {
                CheckResult::pass(CheckKind::NotNull, Some(column))
            } else {
                CheckResult::fail(
                    CheckKind::NotNull,
                    Some(column),
                    format!("found {nulls} null values"),
                    nulls,
                )
            }
        })
    }

    /// Every value of `column` occurs once; repeats after the first count
    pub fn check_unique(self, column: &str) -> Self {
        self.column_check(CheckKind::Unique, column, |values| {
            let mut seen = HashSet::new();
            let mut samples = Vec::new();
            let mut duplicates = 0;
            for value in values {
                let key = sample_text(value);
                if !seen.insert(key.clone()) {
                    duplicates += 1;
                    if samples.len() < MAX_SAMPLES && !samples.contains(&key) {
                        samples.push(key);
                    }
                }
            }
            if duplicates == 0 {
                CheckResult::pass(CheckKind::Unique, Some(column))
            } else {
                CheckResult::fail(
                    CheckKind::Unique,
                    Some(column),
                    format!("found {duplicates} duplicates"),
                    duplicates,
                )
                .with_samples(samples)
            }
        })
    }

    /// Numeric values of `column` lie within the inclusive bounds; nulls
    /// and non-numeric values are skipped
    pub fn check_range(self, column: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.column_check(CheckKind::Range, column, |values| {
            let out_of_range: Vec<f64> = values
                .filter_map(numeric)
                .filter(|x| min.is_some_and(|m| *x < m) || max.is_some_and(|m| *x > m))
                .collect();
            if out_of_range.is_empty() {
                CheckResult::pass(CheckKind::Range, Some(column))
            } else {
                CheckResult::fail(
                    CheckKind::Range,
                    Some(column),
                    format!("found {} out of range values", out_of_range.len()),
                    out_of_range.len(),
                )
                .with_samples(
                    out_of_range
                        .iter()
                        .take(MAX_SAMPLES)
                        .map(f64::to_string)
                        .collect(),
                )
            }
        })
    }

    /// Non-null values of `column` are among `allowed`
    pub fn check_values_in(self, column: &str, allowed: &[Value]) -> Self {
        self.column_check(CheckKind::ValuesIn, column, |values| {
            let mut samples: Vec<String> = Vec::new();
            let mut invalid = 0;
            for value in values.filter(|v| !v.is_null() && !allowed.contains(*v)) {
                invalid += 1;
                let text = sample_text(value);
                if samples.len() < MAX_SAMPLES && !samples.contains(&text) {
                    samples.push(text);
                }
            }
            if invalid == 0 {
                CheckResult::pass(CheckKind::ValuesIn, Some(column))
            } else {
                CheckResult::fail(
                    CheckKind::ValuesIn,
                    Some(column),
                    format!("found {invalid} invalid values"),
                    invalid,
                )
                .with_samples(samples)
            }
        })
    }

    /// Row count lies within the inclusive bounds
    pub fn check_row_count(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        let rows = self.table.len();
        let result = match (min, max) {
            (Some(min), _) if rows < min => CheckResult::fail(
                CheckKind::RowCount,
                None,
                format!("row count {rows} is less than minimum {min}"),
                0,
            ),
            (_, Some(max)) if rows > max => CheckResult::fail(
                CheckKind::RowCount,
                None,
                format!("row count {rows} exceeds maximum {max}"),
                0,
            ),
            _ => CheckResult::pass(CheckKind::RowCount, None),
        };
        self.results.push(result);
        self
    }

    pub fn validate(self) -> ValidationReport {
        ValidationReport {
            total_rows: self.table.len(),
            results: self.results,
        }
    }

    fn column_check<F>(mut self, kind: CheckKind, column: &str, check: F) -> Self
    where
        F: FnOnce(&mut dyn Iterator<Item = &Value>) -> CheckResult,
    {
        let result = match self.table.column_index(column) {
            Some(idx) => check(&mut self.table.rows().iter().map(|row| &row[idx])),
            None => CheckResult::fail(kind, Some(column), "column not found".to_string(), 0),
        };
        self.results.push(result);
        self
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) if !f.is_nan() => Some(*f),
        _ => None,
    }
}

fn sample_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
