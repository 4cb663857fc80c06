//! Tenant configuration model
//!
//! One YAML document per tenant describes its source database, object
//! storage prefix, target database, pipelines and job toggles. The document
//! may nest everything under a top-level `tenant:` key.

use crate::defaults::default_pipelines;
use crate::error::{CoreError, CoreResult};
use crate::identifier::{PipelineName, TenantId};
use crate::pipeline::PipelineConfig;
use crate::serde_helpers::{default_true, flag, port};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Full configuration of one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    /// Unique id, `^[a-z][a-z0-9_]*$`
    pub id: TenantId,

    /// Display name
    pub name: String,

    /// Global kill switch
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub enabled: bool,

    /// Per-environment enablement; environments not listed are enabled
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Tenant-owned source database
    pub source_database: SourceDatabaseConfig,

    /// Object storage location for stage outputs
    #[serde(default)]
    pub storage: StorageConfig,

    /// Shared target store connection; defaults apply when omitted
    #[serde(default)]
    pub target_database: TargetDatabaseConfig,

    /// Pipelines by name; empty means the built-in default set
    #[serde(default)]
    pub pipelines: BTreeMap<PipelineName, PipelineConfig>,

    /// Job toggles and schedules
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Free-form tags propagated to jobs and schedules
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Enablement of a tenant in one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub enabled: bool,
}

/// Source database connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_source_port", deserialize_with = "port")]
    pub port: u16,

    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_source_schema")]
    pub schema: String,

    /// Local DuckDB file standing in for the source (development runs)
    #[serde(default)]
    pub path: Option<String>,
}

/// Object storage location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Key prefix for this tenant; `tenant_id=<id>` when empty
    #[serde(default)]
    pub base_path: String,
}

/// Shared target store connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_target_port", deserialize_with = "port")]
    pub port: u16,

    #[serde(default = "default_target_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Catalog qualifier; tables are addressed `schema.table` when unset
    #[serde(default)]
    pub catalog: Option<String>,

    /// Default schema of the shared tables
    #[serde(default = "default_shared_schema")]
    pub schema: String,

    /// Tenant discriminator column present on every shared table
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,

    /// DuckDB database path used by the bundled backend
    #[serde(default = "default_target_path")]
    pub path: String,
}

impl Default for TargetDatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_target_port(),
            user: default_target_user(),
            password: String::new(),
            catalog: None,
            schema: default_shared_schema(),
            tenant_column: default_tenant_column(),
            path: default_target_path(),
        }
    }
}

/// Job toggles for one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// All partitioned stages
    #[serde(default)]
    pub daily_etl: JobConfig,

    /// All unpartitioned (master/reference) stages
    #[serde(default)]
    pub reference_sync: JobConfig,

    #[serde(default = "JobConfig::disabled")]
    pub extract_only: JobConfig,

    #[serde(default = "JobConfig::disabled")]
    pub transfer_only: JobConfig,

    #[serde(default = "JobConfig::disabled")]
    pub load_only: JobConfig,

    /// Cross-cutting jobs selecting the stages of the listed pipelines
    #[serde(default)]
    pub pipelines: BTreeMap<String, NamedJobConfig>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            daily_etl: JobConfig::default(),
            reference_sync: JobConfig::default(),
            extract_only: JobConfig::disabled(),
            transfer_only: JobConfig::disabled(),
            load_only: JobConfig::disabled(),
            pipelines: BTreeMap::new(),
        }
    }
}

/// Toggle and optional schedule of a built-in job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: None,
        }
    }
}

impl JobConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            schedule: None,
        }
    }
}

/// A named job over an explicit list of pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedJobConfig {
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub enabled: bool,

    pub pipelines: Vec<PipelineName>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

/// Cron trigger attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_cron")]
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Start the schedule in the running state
    #[serde(default, deserialize_with = "flag")]
    pub auto_start: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_source_port() -> u16 {
    5432
}

fn default_target_port() -> u16 {
    8080
}

fn default_target_user() -> String {
    "trino".to_string()
}

fn default_source_schema() -> String {
    "public".to_string()
}

fn default_bucket() -> String {
    "data-lake".to_string()
}

fn default_shared_schema() -> String {
    "aps".to_string()
}

/// Default tenant discriminator column
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";

/// Default partition-date key column stamped by transforms
pub const SNAPSHOT_DATE_COLUMN: &str = "snapshot_date";

fn default_tenant_column() -> String {
    DEFAULT_TENANT_COLUMN.to_string()
}

fn default_target_path() -> String {
    ":memory:".to_string()
}

fn default_cron() -> String {
    "0 1 * * *".to_string()
}

fn default_timezone() -> String {
    "Asia/Seoul".to_string()
}

/// Accepts the classic five-field cron form
fn is_valid_cron(expr: &str) -> bool {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    fields.len() == 5
        && fields.iter().all(|f| {
            f.chars()
                .all(|c| c.is_ascii_alphanumeric() || "*/,-?".contains(c))
        })
}

/// Wrapper accepting documents that nest the tenant under `tenant:`
#[derive(Deserialize)]
#[serde(untagged)]
enum TenantDocument {
    Wrapped { tenant: serde_yaml::Value },
    Bare(serde_yaml::Value),
}

impl TenantConfig {
    /// Parse a tenant from an already-interpolated YAML tree and validate it
    pub fn from_yaml_value(value: serde_yaml::Value) -> CoreResult<Self> {
        let inner = match serde_yaml::from_value::<TenantDocument>(value)? {
            TenantDocument::Wrapped { tenant } => tenant,
            TenantDocument::Bare(bare) => bare,
        };
        let config: TenantConfig = serde_yaml::from_value(inner)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants serde cannot express
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| CoreError::ConfigInvalid {
            tenant: self.id.to_string(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty".to_string()));
        }
        if self.target_database.tenant_column.trim().is_empty() {
            return Err(invalid("target_database.tenant_column cannot be empty".to_string()));
        }
        for (name, pipeline) in &self.pipelines {
            pipeline.validate(name).map_err(invalid)?;
        }
        for (job, schedule) in self.jobs.schedules() {
            if !is_valid_cron(&schedule.cron) {
                return Err(invalid(format!(
                    "job '{}' has invalid cron expression '{}'",
                    job, schedule.cron
                )));
            }
        }
        for (job, named) in &self.jobs.pipelines {
            if PipelineName::try_new(job.as_str()).is_err() {
                return Err(invalid(format!("job name '{job}' must be an identifier")));
            }
            if named.pipelines.is_empty() {
                return Err(invalid(format!("job '{job}' lists no pipelines")));
            }
        }
        Ok(())
    }

    /// Whether the tenant participates in `environment`.
    ///
    /// A globally disabled tenant is always excluded; otherwise an
    /// environment missing from the map is enabled.
    pub fn is_enabled_for_environment(&self, environment: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.environments
            .get(environment)
            .map_or(true, |env| env.enabled)
    }

    /// Pipelines to build: the configured map, or the default set when empty
    pub fn effective_pipelines(&self) -> Cow<'_, BTreeMap<PipelineName, PipelineConfig>> {
        if self.pipelines.is_empty() {
            Cow::Owned(default_pipelines())
        } else {
            Cow::Borrowed(&self.pipelines)
        }
    }

    /// Object storage prefix, `tenant_id=<id>` when not configured
    pub fn storage_base_path(&self) -> String {
        if self.storage.base_path.trim().is_empty() {
            format!("tenant_id={}", self.id)
        } else {
            self.storage.base_path.trim_end_matches('/').to_string()
        }
    }
}

impl JobsConfig {
    /// Every configured schedule keyed by job config name
    pub fn schedules(&self) -> Vec<(String, &ScheduleConfig)> {
        let builtin = [
            ("daily_etl", &self.daily_etl),
            ("reference_sync", &self.reference_sync),
            ("extract_only", &self.extract_only),
            ("transfer_only", &self.transfer_only),
            ("load_only", &self.load_only),
        ];
        let mut out: Vec<(String, &ScheduleConfig)> = builtin
            .into_iter()
            .filter_map(|(name, job)| job.schedule.as_ref().map(|s| (name.to_string(), s)))
            .collect();
        out.extend(
            self.pipelines
                .iter()
                .filter_map(|(name, job)| job.schedule.as_ref().map(|s| (name.clone(), s))),
        );
        out
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
