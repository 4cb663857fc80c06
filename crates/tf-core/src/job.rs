//! Job and schedule definitions handed to the orchestrator

use crate::config::ScheduleConfig;
use crate::identifier::TenantId;
use crate::partition::Partitioning;
use crate::stage::{StageId, StageKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// What selects the nodes of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Every partitioned node of the tenant
    DailyEtl,
    /// Every unpartitioned node of the tenant
    ReferenceSync,
    /// Every daily-partitioned node of one stage kind
    StageOnly { stage: StageKind },
    /// Nodes of an explicit list of pipelines
    Pipelines { name: String },
}

impl JobKind {
    /// Name fragment between the tenant id and `_job`
    pub fn suffix(&self) -> String {
        match self {
            JobKind::DailyEtl => "daily_etl".to_string(),
            JobKind::ReferenceSync => "reference_sync".to_string(),
            JobKind::StageOnly { stage } => format!("{stage}_only"),
            JobKind::Pipelines { name } => format!("{name}_pipeline"),
        }
    }

    /// Partitioning of the job's nodes when it is uniform by construction
    pub fn partitioning(&self) -> Option<Partitioning> {
        match self {
            JobKind::DailyEtl | JobKind::StageOnly { .. } => Some(Partitioning::Daily),
            JobKind::ReferenceSync => Some(Partitioning::Unpartitioned),
            _ => None,
        }
    }
}

/// A named selection of stage nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDef {
    /// `<tenant>_<suffix>_job`
    pub name: String,
    pub tenant: TenantId,
    pub kind: JobKind,
    pub description: String,
    /// Selected nodes in topological order
    pub stages: Vec<StageId>,
    pub tags: BTreeMap<String, String>,
}

impl JobDef {
    pub fn job_name(tenant: &TenantId, kind: &JobKind) -> String {
        format!("{}_{}_job", tenant, kind.suffix())
    }
}

/// Initial state of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Running,
    Stopped,
}

/// A cron trigger for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleDef {
    /// `<tenant>_<suffix>_schedule`
    pub name: String,
    pub job: String,
    pub cron: String,
    pub timezone: String,
    pub default_status: ScheduleStatus,
    pub tags: BTreeMap<String, String>,
}

impl ScheduleDef {
    pub fn for_job(job: &JobDef, config: &ScheduleConfig) -> Self {
        let default_status = if config.auto_start {
            ScheduleStatus::Running
        } else {
            ScheduleStatus::Stopped
        };
        Self {
            name: format!("{}_{}_schedule", job.tenant, job.kind.suffix()),
            job: job.name.clone(),
            cron: config.cron.clone(),
            timezone: config.timezone.clone(),
            default_status,
            tags: job.tags.clone(),
        }
    }
}
