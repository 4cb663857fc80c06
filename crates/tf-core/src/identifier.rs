//! Strongly-typed identifier newtypes for tenants and pipelines.
//!
//! Both identifiers end up interpolated into storage paths, job names and
//! fallback SQL, so they are validated once at construction and carried as
//! distinct types afterwards.

use crate::error::CoreError;

/// Define a validated string identifier.
///
/// Generates the struct plus `try_new`, `as_str`, `into_inner`, a validating
/// `Deserialize`, transparent `Serialize`, `Display`, `Deref<Target = str>`,
/// `Borrow<str>` and comparisons against `str`.
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident {
            valid: $valid:path,
            error: $error:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl $Name {
            /// Validate and wrap an identifier.
            pub fn try_new(value: impl Into<String>) -> Result<Self, CoreError> {
                let value = value.into();
                if $valid(&value) {
                    Ok(Self(value))
                } else {
                    let make_error: fn(String) -> CoreError = $error;
                    Err(make_error(value))
                }
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::try_new(s).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $Name {
            type Error = CoreError;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::try_new(s)
            }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

/// `^[a-z][a-z0-9_]*$`
pub(crate) fn is_valid_tenant_id(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub(crate) fn is_valid_pipeline_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

define_identifier! {
    /// Tenant identifier, also used as the tenant discriminator value in the
    /// shared target store.
    pub struct TenantId {
        valid: is_valid_tenant_id,
        error: |id| CoreError::InvalidTenantId { id },
    }
}

define_identifier! {
    /// Logical dataset name of a pipeline (`lot_history`, `item_master`, ...).
    pub struct PipelineName {
        valid: is_valid_pipeline_name,
        error: |name| CoreError::InvalidPipelineName { name },
    }
}

#[cfg(test)]
#[path = "identifier_test.rs"]
mod tests;
