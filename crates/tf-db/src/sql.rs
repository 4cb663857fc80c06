//! SQL text rendering for values and identifiers
//!
//! The upsert engine composes statements as text, so every value goes
//! through [`render_value`] and every table or column name through
//! [`validate_identifier`] before it reaches the database.

use crate::error::{DbError, DbResult};
use regex::Regex;
use std::sync::OnceLock;
use tf_core::{TargetTable, Value};

static IDENTIFIER_RE: OnceLock<Regex> = OnceLock::new();

fn identifier_re() -> &'static Regex {
    IDENTIFIER_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// Single-quote a string, doubling embedded quotes
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a value as a SQL literal.
///
/// Non-finite floats become `NULL`; dates and JSON documents are written as
/// quoted strings and rely on the target's implicit casts.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => {
            let text = f.to_string();
            // `1` would be read back as an integer literal
            if text.contains(['.', 'e', 'E']) {
                text
            } else {
                format!("{text}.0")
            }
        }
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => quote_literal(s),
        Value::Date(d) => quote_literal(&d.format("%Y-%m-%d").to_string()),
        Value::Json(j) => quote_literal(&j.to_string()),
    }
}

/// Accept only bare identifiers: a letter or underscore followed by
/// letters, digits or underscores.
pub fn validate_identifier(name: &str) -> DbResult<&str> {
    if name.is_empty() {
        return Err(DbError::InvalidIdentifier {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if !identifier_re().is_match(name) {
        return Err(DbError::InvalidIdentifier {
            name: name.to_string(),
            reason: "only letters, digits and underscores are allowed".to_string(),
        });
    }
    Ok(name)
}

/// Dotted name of a target table after validating every part
pub fn qualified_name(target: &TargetTable) -> DbResult<String> {
    for part in target.parts() {
        validate_identifier(part)?;
    }
    Ok(target.to_string())
}

/// `col = literal`, or `col IS NULL` for null values
pub fn key_predicate(column: &str, value: &Value) -> String {
    if value.is_null() {
        format!("{column} IS NULL")
    } else {
        format!("{column} = {}", render_value(value))
    }
}
