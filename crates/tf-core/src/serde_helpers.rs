//! Shared serde helper functions used across multiple modules.
//!
//! Placeholder interpolation always yields strings, so typed fields that
//! commonly come from the environment (`port: ${DB_PORT:5432}`,
//! `enabled: ${ACME_ENABLED:true}`) accept their text form as well.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Serde default function that returns `true`.
///
/// Used for flags that default to enabled (tenants, jobs, storage writes).
pub fn default_true() -> bool {
    true
}

/// Returns `true` when the value equals its type's default.
///
/// Used with `skip_serializing_if` to keep serialized graphs compact.
pub fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NativeOrText<T> {
    Native(T),
    Text(String),
}

/// Parse a flag written as text: `true/false`, `yes/no`, `on/off`, `1/0`
fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn text_flag<E: serde::de::Error>(text: &str) -> Result<bool, E> {
    parse_flag(text).ok_or_else(|| E::custom(format!("invalid boolean '{text}'")))
}

/// `deserialize_with` for `bool` fields
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match NativeOrText::<bool>::deserialize(deserializer)? {
        NativeOrText::Native(value) => Ok(value),
        NativeOrText::Text(text) => text_flag(&text),
    }
}

/// `deserialize_with` for `Option<bool>` fields; empty text is absent
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NativeOrText<bool>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NativeOrText::Native(value)) => Ok(Some(value)),
        Some(NativeOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NativeOrText::Text(text)) => text_flag(&text).map(Some),
    }
}

/// `deserialize_with` for TCP port fields
pub fn port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match NativeOrText::<u16>::deserialize(deserializer)? {
        NativeOrText::Native(value) => Ok(value),
        NativeOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid port '{text}'"))),
    }
}
