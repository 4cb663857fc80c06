//! Per-tenant stage graph construction
//!
//! [`GraphBuilder`] turns a tenant's resolved pipeline configs into
//! Extract/Transfer/Load nodes, wires them into a [`StageDag`], and groups
//! them into jobs and schedules. Misconfigured pipelines lose the affected
//! nodes and leave a [`GraphViolation`] behind; the rest of the tenant's
//! graph is still built.

use crate::config::{JobsConfig, ScheduleConfig, TenantConfig};
use crate::custom_code::{BindingOrigin, BindingSource, CustomCodeResolver, StaticBindingSource};
use crate::dag::StageDag;
use crate::defaults::fallback_query;
use crate::error::{CoreError, CoreResult};
use crate::identifier::{PipelineName, TenantId};
use crate::job::{JobDef, JobKind, ScheduleDef};
use crate::partition::Partitioning;
use crate::pipeline::PipelineConfig;
use crate::stage::{StageDetail, StageId, StageKind, StageNode, TargetTable};
use crate::transform::TransformCatalog;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A configuration problem found while building a tenant's graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphViolation {
    pub pipeline: PipelineName,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    /// `save_to_target` without a pipeline, tenant or shared target descriptor
    MissingTargetDescriptor,
    /// A transfer input names a pipeline the tenant does not have
    UnknownTransferInput { input: PipelineName },
    /// A transfer input is partitioned differently from the pipeline
    MixedPartitioning {
        input: PipelineName,
        expected: Partitioning,
        found: Partitioning,
    },
    /// A named job lists a pipeline the tenant does not have
    UnknownJobPipeline { job: String },
}

impl fmt::Display for GraphViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingTargetDescriptor => write!(
                f,
                "pipeline '{}' has save_to_target but no target descriptor; load stage dropped",
                self.pipeline
            ),
            ViolationKind::UnknownTransferInput { input } => write!(
                f,
                "pipeline '{}' reads unknown transfer input '{}'; transfer and load dropped",
                self.pipeline, input
            ),
            ViolationKind::MixedPartitioning {
                input,
                expected,
                found,
            } => write!(
                f,
                "pipeline '{}' is {} but transfer input '{}' is {}; transfer and load dropped",
                self.pipeline, expected, input, found
            ),
            ViolationKind::UnknownJobPipeline { job } => write!(
                f,
                "job '{}' lists unknown pipeline '{}'",
                job, self.pipeline
            ),
        }
    }
}

/// The executable graph of one tenant
#[derive(Debug, Serialize)]
pub struct PipelineGraph {
    pub tenant: TenantId,
    pub environment: String,
    /// Nodes in pipeline-name order, Extract → Transfer → Load within a pipeline
    pub nodes: Vec<StageNode>,
    /// `(upstream, downstream)` pairs, sorted
    pub edges: Vec<(StageId, StageId)>,
    pub jobs: Vec<JobDef>,
    pub schedules: Vec<ScheduleDef>,
    pub diagnostics: Vec<GraphViolation>,
    #[serde(skip)]
    dag: StageDag,
}

impl PipelineGraph {
    pub fn node(&self, id: &str) -> Option<&StageNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    pub fn job(&self, name: &str) -> Option<&JobDef> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Nodes of one pipeline in stage order
    pub fn pipeline_nodes(&self, pipeline: &str) -> Vec<&StageNode> {
        self.nodes
            .iter()
            .filter(|n| n.pipeline.as_str() == pipeline)
            .collect()
    }

    pub fn dag(&self) -> &StageDag {
        &self.dag
    }

    /// All nodes, upstream first
    pub fn topological_nodes(&self) -> CoreResult<Vec<&StageNode>> {
        let order = self.dag.topological_order()?;
        Ok(order
            .iter()
            .filter_map(|id| self.node(id.as_str()))
            .collect())
    }
}

/// Builds [`PipelineGraph`]s.
///
/// A fresh [`CustomCodeResolver`] is created per [`build`](Self::build)
/// call, so bindings are loaded once per construction pass.
#[derive(Clone)]
pub struct GraphBuilder {
    source: Arc<dyn BindingSource>,
    catalog: Arc<TransformCatalog>,
    strict: bool,
}

impl fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(
            Arc::new(StaticBindingSource::new()),
            Arc::new(TransformCatalog::with_defaults()),
        )
    }
}

impl GraphBuilder {
    pub fn new(source: Arc<dyn BindingSource>, catalog: Arc<TransformCatalog>) -> Self {
        Self {
            source,
            catalog,
            strict: false,
        }
    }

    /// Fail the build with every violation instead of dropping nodes
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolver for `tenant` backed by this builder's source and catalog
    pub fn resolver_for(&self, tenant: &TenantConfig) -> CustomCodeResolver {
        CustomCodeResolver::new(
            tenant.id.clone(),
            tenant.target_database.tenant_column.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.catalog),
        )
    }

    /// Build the graph of `tenant` for `environment`
    pub fn build(&self, tenant: &TenantConfig, environment: &str) -> CoreResult<PipelineGraph> {
        let resolver = self.resolver_for(tenant);
        self.build_with_resolver(tenant, environment, &resolver)
    }

    /// Build the graph using a caller-owned resolver
    pub fn build_with_resolver(
        &self,
        tenant: &TenantConfig,
        environment: &str,
        resolver: &CustomCodeResolver,
    ) -> CoreResult<PipelineGraph> {
        if resolver.tenant() != &tenant.id {
            return Err(CoreError::ConfigInvalid {
                tenant: tenant.id.to_string(),
                message: format!("resolver is bound to tenant '{}'", resolver.tenant()),
            });
        }

        let pipelines = tenant.effective_pipelines();
        let resolved: BTreeMap<&PipelineName, std::borrow::Cow<'_, PipelineConfig>> = pipelines
            .iter()
            .map(|(name, config)| (name, config.resolve_for_env(environment)))
            .collect();

        let mut nodes = Vec::new();
        let mut diagnostics = Vec::new();
        for (name, config) in &resolved {
            self.pipeline_nodes(
                tenant,
                name,
                config,
                &resolved,
                resolver,
                &mut nodes,
                &mut diagnostics,
            );
        }

        for (job, named) in &tenant.jobs.pipelines {
            for pipeline in &named.pipelines {
                if !resolved.contains_key(pipeline) {
                    diagnostics.push(GraphViolation {
                        pipeline: pipeline.clone(),
                        kind: ViolationKind::UnknownJobPipeline { job: job.clone() },
                    });
                }
            }
        }

        if !diagnostics.is_empty() {
            if self.strict {
                return Err(CoreError::PipelineConfig {
                    tenant: tenant.id.to_string(),
                    violations: diagnostics,
                });
            }
            for violation in &diagnostics {
                log::warn!("[{}] {}", tenant.id, violation);
            }
        }

        let dag = StageDag::build(nodes.iter().map(|n: &StageNode| (&n.id, n.upstream.as_slice())))?;
        let order = dag.topological_order()?;
        let jobs = assemble_jobs(tenant, &nodes, &order);
        let schedules = assemble_schedules(&tenant.jobs, &jobs);

        Ok(PipelineGraph {
            tenant: tenant.id.clone(),
            environment: environment.to_string(),
            edges: dag.edges(),
            nodes,
            jobs,
            schedules,
            diagnostics,
            dag,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn pipeline_nodes(
        &self,
        tenant: &TenantConfig,
        name: &PipelineName,
        config: &PipelineConfig,
        all: &BTreeMap<&PipelineName, std::borrow::Cow<'_, PipelineConfig>>,
        resolver: &CustomCodeResolver,
        nodes: &mut Vec<StageNode>,
        diagnostics: &mut Vec<GraphViolation>,
    ) {
        let partitioning = config.partitioning();
        let node = |kind: StageKind, upstream: Vec<StageId>, detail: StageDetail| StageNode {
            id: StageId::new(&tenant.id, kind, name),
            tenant: tenant.id.clone(),
            pipeline: name.clone(),
            kind,
            partitioning,
            upstream,
            detail,
        };

        let (query, query_origin) = match &config.query {
            Some(query) => (query.clone(), BindingOrigin::Pipeline),
            None => {
                let resolved = resolver.query_for(name);
                match resolved.origin {
                    BindingOrigin::Fallback => {
                        (fallback_query(&config.source_table), BindingOrigin::Fallback)
                    }
                    origin => (resolved.value, origin),
                }
            }
        };
        let extract = node(
            StageKind::Extract,
            Vec::new(),
            StageDetail::Extract {
                query,
                query_origin,
                date_column: config.date_column.clone(),
                save_to_storage: config.save_to_storage,
            },
        );
        let mut last = extract.id.clone();
        nodes.push(extract);

        if config.has_transfer {
            let inputs = dedup(config.effective_transfer_inputs(name));
            let mut broken = false;
            for input in &inputs {
                match all.get(input) {
                    None => {
                        broken = true;
                        diagnostics.push(GraphViolation {
                            pipeline: name.clone(),
                            kind: ViolationKind::UnknownTransferInput {
                                input: input.clone(),
                            },
                        });
                    }
                    Some(input_config) if input_config.partitioning() != partitioning => {
                        broken = true;
                        diagnostics.push(GraphViolation {
                            pipeline: name.clone(),
                            kind: ViolationKind::MixedPartitioning {
                                input: input.clone(),
                                expected: partitioning,
                                found: input_config.partitioning(),
                            },
                        });
                    }
                    Some(_) => {}
                }
            }
            if broken {
                return;
            }

            let resolved = resolver.transform_for(name);
            let upstream = inputs
                .iter()
                .map(|input| StageId::new(&tenant.id, StageKind::Extract, input))
                .collect();
            let transfer = node(
                StageKind::Transfer,
                upstream,
                StageDetail::Transfer {
                    transform: resolved.value,
                    transform_origin: resolved.origin,
                    inputs,
                },
            );
            last = transfer.id.clone();
            nodes.push(transfer);
        }

        if !config.save_to_target {
            return;
        }
        let (descriptor, target_origin) = match &config.target {
            Some(target) => (target.clone(), BindingOrigin::Pipeline),
            None => {
                let resolved = resolver.load_config_for(name);
                if resolved.origin == BindingOrigin::Fallback {
                    diagnostics.push(GraphViolation {
                        pipeline: name.clone(),
                        kind: ViolationKind::MissingTargetDescriptor,
                    });
                    return;
                }
                (resolved.value, resolved.origin)
            }
        };
        let target_db = &tenant.target_database;
        nodes.push(node(
            StageKind::Load,
            vec![last],
            StageDetail::Load {
                target: TargetTable::new(
                    target_db.catalog.clone(),
                    descriptor.schema,
                    descriptor.table,
                ),
                key_columns: descriptor.key_columns,
                tenant_column: target_db.tenant_column.clone(),
                target_origin,
            },
        ));
    }
}

fn dedup(names: Vec<PipelineName>) -> Vec<PipelineName> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

fn job_config_schedule<'a>(jobs: &'a JobsConfig, kind: &JobKind) -> Option<&'a ScheduleConfig> {
    match kind {
        JobKind::DailyEtl => jobs.daily_etl.schedule.as_ref(),
        JobKind::ReferenceSync => jobs.reference_sync.schedule.as_ref(),
        JobKind::StageOnly { stage } => match stage {
            StageKind::Extract => jobs.extract_only.schedule.as_ref(),
            StageKind::Transfer => jobs.transfer_only.schedule.as_ref(),
            StageKind::Load => jobs.load_only.schedule.as_ref(),
        },
        JobKind::Pipelines { name } => jobs.pipelines.get(name).and_then(|j| j.schedule.as_ref()),
    }
}

fn assemble_jobs(tenant: &TenantConfig, nodes: &[StageNode], order: &[StageId]) -> Vec<JobDef> {
    let jobs = &tenant.jobs;
    let mut tags = tenant.tags.clone();
    tags.insert("tenant_id".to_string(), tenant.id.to_string());

    let mut candidates: Vec<(JobKind, bool, String)> = vec![
        (
            JobKind::DailyEtl,
            jobs.daily_etl.enabled,
            format!("[{}] Daily ETL of partitioned pipelines", tenant.name),
        ),
        (
            JobKind::ReferenceSync,
            jobs.reference_sync.enabled,
            format!("[{}] Reference data sync", tenant.name),
        ),
    ];
    for (stage, config) in [
        (StageKind::Extract, &jobs.extract_only),
        (StageKind::Transfer, &jobs.transfer_only),
        (StageKind::Load, &jobs.load_only),
    ] {
        candidates.push((
            JobKind::StageOnly { stage },
            config.enabled,
            format!("[{}] {} stages only", tenant.name, stage),
        ));
    }
    for (name, named) in &jobs.pipelines {
        let description = named
            .description
            .clone()
            .unwrap_or_else(|| format!("[{}] {} pipeline", tenant.name, name));
        candidates.push((
            JobKind::Pipelines { name: name.clone() },
            named.enabled,
            description,
        ));
    }

    let by_id: BTreeMap<&StageId, &StageNode> = nodes.iter().map(|n| (&n.id, n)).collect();
    candidates
        .into_iter()
        .filter(|(_, enabled, _)| *enabled)
        .filter_map(|(kind, _, description)| {
            let stages: Vec<StageId> = order
                .iter()
                .filter(|id| by_id.get(id).is_some_and(|n| selects(jobs, &kind, n)))
                .cloned()
                .collect();
            if stages.is_empty() {
                log::debug!(
                    "Job {} selects no stages; not emitted",
                    JobDef::job_name(&tenant.id, &kind)
                );
                return None;
            }
            Some(JobDef {
                name: JobDef::job_name(&tenant.id, &kind),
                tenant: tenant.id.clone(),
                kind,
                description,
                stages,
                tags: tags.clone(),
            })
        })
        .collect()
}

fn selects(jobs: &JobsConfig, kind: &JobKind, node: &StageNode) -> bool {
    match kind {
        JobKind::DailyEtl | JobKind::ReferenceSync => {
            kind.partitioning() == Some(node.partitioning)
        }
        JobKind::StageOnly { stage } => {
            node.kind == *stage && kind.partitioning() == Some(node.partitioning)
        }
        JobKind::Pipelines { name } => jobs
            .pipelines
            .get(name)
            .is_some_and(|job| job.pipelines.contains(&node.pipeline)),
    }
}

fn assemble_schedules(jobs: &JobsConfig, defs: &[JobDef]) -> Vec<ScheduleDef> {
    defs.iter()
        .filter_map(|job| {
            job_config_schedule(jobs, &job.kind).map(|config| ScheduleDef::for_job(job, config))
        })
        .collect()
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
