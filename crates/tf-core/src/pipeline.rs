//! Per-pipeline configuration and environment override resolution

use crate::identifier::PipelineName;
use crate::partition::Partitioning;
use crate::serde_helpers::{default_true, flag, is_default, optional_flag};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Configuration of one logical dataset flowing Extract → Transfer → Load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Table the default extract query reads from
    pub source_table: String,

    /// Explicit extract query; takes precedence over custom/shared queries
    #[serde(default)]
    pub query: Option<String>,

    /// Date expression used to filter a partition. Unset means the pipeline
    /// is master/reference data extracted as a single latest snapshot.
    #[serde(default)]
    pub date_column: Option<String>,

    /// Persist extracted data to object storage
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub save_to_storage: bool,

    /// Run a transform stage after extraction
    #[serde(default, skip_serializing_if = "is_default", deserialize_with = "flag")]
    pub has_transfer: bool,

    /// Pipelines whose extracts feed the transform (defaults to this pipeline)
    #[serde(default, skip_serializing_if = "is_default")]
    pub transfer_inputs: Vec<PipelineName>,

    /// Upsert the result into the shared target store
    #[serde(default, skip_serializing_if = "is_default", deserialize_with = "flag")]
    pub save_to_target: bool,

    /// Target table descriptor, required for a Load stage
    #[serde(default)]
    pub target: Option<LoadConfig>,

    /// Environment-specific flag overrides, keyed by environment name
    #[serde(default, skip_serializing_if = "is_default")]
    pub env_overrides: BTreeMap<String, EnvOverride>,
}

/// Where and how a pipeline's rows land in the target store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Target table name
    pub table: String,

    /// Target schema
    #[serde(default = "default_target_schema")]
    pub schema: String,

    /// Columns identifying a logical record for replace-by-key upserts
    #[serde(default)]
    pub key_columns: Vec<String>,
}

fn default_target_schema() -> String {
    "public".to_string()
}

impl LoadConfig {
    pub fn new(
        table: impl Into<String>,
        schema: impl Into<String>,
        key_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            table: table.into(),
            schema: schema.into(),
            key_columns: key_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Describe the first missing piece, if any
    pub fn validate(&self) -> Result<(), String> {
        if self.table.trim().is_empty() {
            return Err("target table cannot be empty".to_string());
        }
        if self.schema.trim().is_empty() {
            return Err("target schema cannot be empty".to_string());
        }
        if self.key_columns.is_empty() {
            return Err("key_columns cannot be empty".to_string());
        }
        if self.key_columns.iter().any(|c| c.trim().is_empty()) {
            return Err("key_columns cannot contain empty names".to_string());
        }
        Ok(())
    }
}

/// Flag overrides applied for one environment; absent fields keep the base value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvOverride {
    #[serde(default, deserialize_with = "optional_flag")]
    pub save_to_storage: Option<bool>,

    #[serde(default, deserialize_with = "optional_flag")]
    pub save_to_target: Option<bool>,
}

impl EnvOverride {
    fn is_noop_for(&self, config: &PipelineConfig) -> bool {
        self.save_to_storage.map_or(true, |v| v == config.save_to_storage)
            && self.save_to_target.map_or(true, |v| v == config.save_to_target)
    }
}

/// A pipeline configuration with the active environment's overrides applied.
///
/// `Borrowed` means no override applied and the caller's config is returned
/// untouched; `Owned` carries the patched copy.
pub type ResolvedPipelineConfig<'a> = Cow<'a, PipelineConfig>;

impl PipelineConfig {
    /// Minimal config reading `source_table` with every stage flag at its default
    pub fn new(source_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            query: None,
            date_column: None,
            save_to_storage: true,
            has_transfer: false,
            transfer_inputs: Vec::new(),
            save_to_target: false,
            target: None,
            env_overrides: BTreeMap::new(),
        }
    }

    pub fn partitioning(&self) -> Partitioning {
        Partitioning::from_date_column(self.date_column.as_deref())
    }

    /// Names feeding the transform; the pipeline itself when none are declared
    pub fn effective_transfer_inputs(&self, own_name: &PipelineName) -> Vec<PipelineName> {
        if self.transfer_inputs.is_empty() {
            vec![own_name.clone()]
        } else {
            self.transfer_inputs.clone()
        }
    }

    /// Apply the overrides declared for `environment`.
    ///
    /// Pure function of `(self, environment)`. Only `save_to_storage` and
    /// `save_to_target` can change; the override map itself is carried over
    /// so resolving an already-resolved config is a no-op.
    pub fn resolve_for_env(&self, environment: &str) -> ResolvedPipelineConfig<'_> {
        let Some(over) = self.env_overrides.get(environment) else {
            return Cow::Borrowed(self);
        };
        if over.is_noop_for(self) {
            return Cow::Borrowed(self);
        }

        let mut resolved = self.clone();
        if let Some(save_to_storage) = over.save_to_storage {
            resolved.save_to_storage = save_to_storage;
        }
        if let Some(save_to_target) = over.save_to_target {
            resolved.save_to_target = save_to_target;
        }
        Cow::Owned(resolved)
    }

    /// Load-time validation of the pipeline's own fields
    pub(crate) fn validate(&self, name: &PipelineName) -> Result<(), String> {
        if self.source_table.trim().is_empty() {
            return Err(format!("pipeline '{name}': source_table cannot be empty"));
        }
        if let Some(target) = &self.target {
            target
                .validate()
                .map_err(|msg| format!("pipeline '{name}': {msg}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
