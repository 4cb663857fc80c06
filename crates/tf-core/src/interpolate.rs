//! `${NAME}` / `${NAME:default}` placeholder resolution over YAML trees
//!
//! Resolution is total: a placeholder whose variable is unset and has no
//! default becomes the empty string.

use regex::{Captures, Regex};
use serde_yaml::Value;
use std::sync::OnceLock;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("valid regex"))
}

/// Apply `resolve` to every string leaf of `value`, recursing through
/// mappings and sequences. Keys and non-string scalars are left untouched.
pub fn map_string_leaves<F>(value: Value, resolve: &mut F) -> Value
where
    F: FnMut(&str) -> String,
{
    match value {
        Value::String(s) => Value::String(resolve(&s)),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| map_string_leaves(item, resolve))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, map_string_leaves(v, resolve)))
                .collect(),
        ),
        Value::Tagged(mut tagged) => {
            tagged.value = map_string_leaves(tagged.value, resolve);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Replace every placeholder in `input` using `lookup` for variable values
pub fn interpolate_str<L>(input: &str, lookup: &L) -> String
where
    L: Fn(&str) -> Option<String> + ?Sized,
{
    if !input.contains("${") {
        return input.to_string();
    }
    placeholder_regex()
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            lookup(name)
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Resolve placeholders in every string leaf of a YAML tree
pub fn interpolate_value<L>(value: Value, lookup: &L) -> Value
where
    L: Fn(&str) -> Option<String> + ?Sized,
{
    map_string_leaves(value, &mut |s: &str| interpolate_str(s, lookup))
}

/// Process environment lookup
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
#[path = "interpolate_test.rs"]
mod tests;
