//! Error types for tf-core

use thiserror::Error;

/// Core error type for tenantflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Tenant document could not be parsed
    #[error("[C001] Failed to parse tenant config {path}: {message}")]
    ConfigParseError { path: String, message: String },

    /// C002: Tenant document parsed but failed validation
    #[error("[C002] Invalid tenant config '{tenant}': {message}")]
    ConfigInvalid { tenant: String, message: String },

    /// C003: Tenant id does not match `^[a-z][a-z0-9_]*$`
    #[error("[C003] Invalid tenant id '{id}': must be lowercase alphanumeric/underscore starting with a letter")]
    InvalidTenantId { id: String },

    /// C015: Pipeline name is not a plain identifier
    #[error("[C015] Invalid pipeline name '{name}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidPipelineName { name: String },

    /// C004: Tenant custom code binding could not be loaded
    #[error("[C004] Failed to load custom code for tenant '{tenant}': {message}")]
    CustomCodeLoad { tenant: String, message: String },

    /// C005: One or more pipelines are misconfigured (strict mode)
    #[error("[C005] Pipeline configuration errors for tenant '{tenant}': {}", format_violations(.violations))]
    PipelineConfig {
        tenant: String,
        violations: Vec<crate::graph::GraphViolation>,
    },

    /// C006: Transform name not registered in the catalog
    #[error("[C006] Unknown transform '{name}'")]
    UnknownTransform { name: String },

    /// C007: Transform function returned an error
    #[error("[C007] Transform for pipeline '{pipeline}' failed: {message}")]
    TransformFailed { pipeline: String, message: String },

    /// C008: Object storage read/write failure
    #[error("[C008] Storage error at '{path}': {message}")]
    Storage { path: String, message: String },

    /// C009: Partition key is not a `YYYY-MM-DD` date
    #[error("[C009] Invalid partition key '{value}': expected YYYY-MM-DD")]
    InvalidPartition { value: String },

    /// C010: Stage graph contains a cycle
    #[error("[C010] Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// C011: Empty name where a non-empty one is required
    #[error("[C011] Empty name: {context}")]
    EmptyName { context: String },

    /// C016: Row width does not match the table's columns
    #[error("[C016] Table shape mismatch: {message}")]
    TableShape { message: String },

    /// C012: IO error with file path context
    #[error("[C012] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C013: IO error
    #[error("[C013] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// C014: YAML parse error
    #[error("[C014] YAML error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_violations(violations: &[crate::graph::GraphViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
