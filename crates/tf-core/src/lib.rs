//! tf-core - Core library for tenantflow
//!
//! This crate provides the tenant configuration model and loader,
//! environment override resolution, custom-code binding resolution, and
//! stage-graph construction used by the other tenantflow crates. It performs
//! no database I/O.

pub mod config;
pub mod custom_code;
pub mod dag;
pub mod defaults;
pub mod error;
pub mod extract;
pub mod graph;
pub mod identifier;
pub mod interpolate;
pub mod job;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub(crate) mod serde_helpers;
pub mod stage;
pub mod storage;
pub mod table;
pub mod transform;
pub mod validation;

pub use config::{
    JobConfig, JobsConfig, NamedJobConfig, ScheduleConfig, SourceDatabaseConfig, StorageConfig,
    TargetDatabaseConfig, TenantConfig,
};
pub use custom_code::{
    BindingOrigin, BindingSource, CustomCodeBinding, CustomCodeResolver, DirectoryBindingSource,
    Resolved, StaticBindingSource,
};
pub use dag::StageDag;
pub use error::{CoreError, CoreResult};
pub use extract::partition_query;
pub use graph::{GraphBuilder, GraphViolation, PipelineGraph, ViolationKind};
pub use identifier::{PipelineName, TenantId};
pub use job::{JobDef, JobKind, ScheduleDef, ScheduleStatus};
pub use loader::ConfigLoader;
pub use partition::{PartitionKey, Partitioning};
pub use pipeline::{EnvOverride, LoadConfig, PipelineConfig, ResolvedPipelineConfig};
pub use stage::{StageDetail, StageId, StageKind, StageNode, TargetTable};
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore, StorageKey};
pub use table::{Table, Value};
pub use transform::{Transform, TransformCatalog, TransformInput};
pub use validation::{CheckKind, CheckResult, TableValidator, ValidationReport};
