//! Stage execution against concrete databases and object storage
//!
//! Extract queries the source database (filtered to the partition date for
//! daily pipelines) and optionally persists the result; Transfer applies
//! its transform to the upstream extracts and always persists; Load stamps
//! the tenant column and upserts into the target table.
//!
//! Database calls and storage I/O run under an optional time limit. DuckDB
//! executes synchronously inside its async methods, so the limit is only
//! enforced between calls for that backend.

use crate::error::{DbError, DbResult};
use crate::traits::Database;
use crate::upsert::{BatchWriteResult, UpsertEngine, UpsertOptions};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tf_core::{
    partition_query, JobDef, ObjectStore, PartitionKey, PipelineGraph, PipelineName, StageDetail,
    StageId, StageKind, StageNode, StorageKey, Table, TenantConfig, TenantId, TransformInput,
    Value,
};

/// What a stage produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Persisted to object storage at `path`
    Stored { path: String, rows: usize },
    /// Kept in memory for downstream stages of the same run
    Inline(Table),
    /// Written to the target database
    Loaded(BatchWriteResult),
}

impl StageOutput {
    /// Rows produced (or inserted, for loads)
    pub fn rows(&self) -> usize {
        match self {
            StageOutput::Stored { rows, .. } => *rows,
            StageOutput::Inline(table) => table.len(),
            StageOutput::Loaded(result) => result.inserted,
        }
    }
}

/// One executed stage of a job run
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun {
    pub stage: StageId,
    pub output: StageOutput,
}

/// Executes stage nodes for one tenant
pub struct StageRunner {
    tenant: TenantId,
    storage_base: String,
    source: Arc<dyn Database>,
    target: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    upsert: UpsertOptions,
    timeout: Option<Duration>,
    create_missing_tables: bool,
}

impl StageRunner {
    pub fn new(
        tenant: &TenantConfig,
        source: Arc<dyn Database>,
        target: Arc<dyn Database>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            tenant: tenant.id.clone(),
            storage_base: tenant.storage_base_path(),
            source,
            target,
            store,
            upsert: UpsertOptions::default(),
            timeout: None,
            create_missing_tables: false,
        }
    }

    pub fn with_upsert_options(mut self, options: UpsertOptions) -> Self {
        self.upsert = options;
        self
    }

    /// Limit each database call and storage operation to `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create absent target tables from the first batch written to them
    pub fn create_missing_tables(mut self, create: bool) -> Self {
        self.create_missing_tables = create;
        self
    }

    /// Run every stage of `job` in dependency order.
    ///
    /// Outputs flow between stages of the same run; a stage whose upstream
    /// is not part of the job reads the upstream's persisted output.
    pub async fn run_job(
        &self,
        graph: &PipelineGraph,
        job: &JobDef,
        partition: Option<PartitionKey>,
    ) -> DbResult<Vec<StageRun>> {
        if job.tenant != self.tenant {
            return Err(DbError::StageInput {
                stage: job.name.clone(),
                message: format!("job belongs to tenant '{}', runner to '{}'", job.tenant, self.tenant),
            });
        }
        let selected: HashSet<&str> = job.stages.iter().map(StageId::as_str).collect();
        let order = graph.topological_nodes()?;

        log::info!(
            "Running job {} ({} stages, partition {})",
            job.name,
            selected.len(),
            partition.map_or_else(|| "latest".to_string(), |p| p.to_string())
        );

        let mut outputs = BTreeMap::new();
        let mut runs = Vec::with_capacity(selected.len());
        for node in order.into_iter().filter(|n| selected.contains(n.id.as_str())) {
            let output = self.run(graph, node, partition, &outputs).await?;
            outputs.insert(node.id.clone(), output.clone());
            runs.push(StageRun {
                stage: node.id.clone(),
                output,
            });
        }
        Ok(runs)
    }

    /// Run a single stage.
    ///
    /// `partition` is required for daily stages and ignored for
    /// unpartitioned ones.
    pub async fn run(
        &self,
        graph: &PipelineGraph,
        node: &StageNode,
        partition: Option<PartitionKey>,
        outputs: &BTreeMap<StageId, StageOutput>,
    ) -> DbResult<StageOutput> {
        let partition = stage_partition(node, partition)?;
        log::debug!("Running stage {}", node.id);

        let output = match &node.detail {
            StageDetail::Extract {
                query,
                date_column,
                save_to_storage,
                ..
            } => {
                let sql = partition_query(query, date_column.as_deref(), partition);
                let table = self
                    .timed("extract query", self.source.query_table(&sql))
                    .await?;
                if *save_to_storage {
                    self.persist(node, partition, table).await?
                } else {
                    StageOutput::Inline(table)
                }
            }
            StageDetail::Transfer {
                transform, inputs, ..
            } => {
                let mut tables = BTreeMap::new();
                for input in inputs {
                    let id = StageId::new(&node.tenant, StageKind::Extract, input);
                    let table = self.upstream_table(graph, &id, partition, outputs).await?;
                    tables.insert(input.clone(), table);
                }
                let table = transform.apply(&TransformInput {
                    tenant: &node.tenant,
                    pipeline: &node.pipeline,
                    partition,
                    inputs: &tables,
                })?;
                self.persist(node, partition, table).await?
            }
            StageDetail::Load {
                target,
                key_columns,
                tenant_column,
                ..
            } => {
                let upstream = node.upstream.first().ok_or_else(|| DbError::StageInput {
                    stage: node.id.to_string(),
                    message: "load stage has no upstream".to_string(),
                })?;
                let mut table = self
                    .upstream_table(graph, upstream, partition, outputs)
                    .await?;
                table.set_constant_column(tenant_column, Value::Text(node.tenant.to_string()));

                let engine = UpsertEngine::with_options(self.target.as_ref(), self.upsert);
                if self.create_missing_tables && !table.is_empty() {
                    self.timed("target table creation", engine.ensure_table(&table, target))
                        .await?;
                }
                let result = self
                    .timed("upsert", engine.upsert(&table, target, key_columns))
                    .await?;
                log::info!(
                    "Loaded {} rows into {} ({} replaced)",
                    result.inserted,
                    target,
                    result.deleted
                );
                StageOutput::Loaded(result)
            }
        };
        Ok(output)
    }

    async fn upstream_table(
        &self,
        graph: &PipelineGraph,
        id: &StageId,
        partition: Option<PartitionKey>,
        outputs: &BTreeMap<StageId, StageOutput>,
    ) -> DbResult<Table> {
        match outputs.get(id) {
            Some(StageOutput::Inline(table)) => Ok(table.clone()),
            Some(StageOutput::Stored { path, .. }) => self.read(path.clone()).await,
            Some(StageOutput::Loaded(_)) => Err(DbError::StageInput {
                stage: id.to_string(),
                message: "a load stage has no output to consume".to_string(),
            }),
            None => {
                let node = graph.node(id.as_str()).ok_or_else(|| DbError::StageInput {
                    stage: id.to_string(),
                    message: "upstream stage is not in the graph".to_string(),
                })?;
                if let StageDetail::Extract {
                    save_to_storage: false,
                    ..
                } = node.detail
                {
                    return Err(DbError::StageInput {
                        stage: id.to_string(),
                        message: "upstream output is not persisted; run it in the same job"
                            .to_string(),
                    });
                }
                let partition = stage_partition(node, partition)?;
                let key = self.key(node.kind, &node.pipeline, partition);
                self.read(self.store.locate(&key)).await
            }
        }
    }

    fn key(
        &self,
        kind: StageKind,
        pipeline: &PipelineName,
        partition: Option<PartitionKey>,
    ) -> StorageKey {
        StorageKey::new(self.storage_base.clone(), kind, pipeline.clone(), partition)
    }

    async fn persist(
        &self,
        node: &StageNode,
        partition: Option<PartitionKey>,
        table: Table,
    ) -> DbResult<StageOutput> {
        let rows = table.len();
        let key = self.key(node.kind, &node.pipeline, partition);
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.write(&table, &key));
        let path = self
            .timed("storage write", async {
                task.await
                    .map_err(|e| DbError::Internal(e.to_string()))?
                    .map_err(DbError::from)
            })
            .await?;
        log::debug!("Stored {} rows for {} at {}", rows, node.id, path);
        Ok(StageOutput::Stored { path, rows })
    }

    async fn read(&self, path: String) -> DbResult<Table> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.read(&path));
        self.timed("storage read", async {
            task.await
                .map_err(|e| DbError::Internal(e.to_string()))?
                .map_err(DbError::from)
        })
        .await
    }

    async fn timed<T, F>(&self, operation: &str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DbError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs_f64(),
                })?,
            None => fut.await,
        }
    }
}

fn stage_partition(
    node: &StageNode,
    partition: Option<PartitionKey>,
) -> DbResult<Option<PartitionKey>> {
    match (node.is_partitioned(), partition) {
        (true, None) => Err(DbError::StageInput {
            stage: node.id.to_string(),
            message: "daily stage requires a partition date".to_string(),
        }),
        (true, Some(partition)) => Ok(Some(partition)),
        (false, _) => Ok(None),
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
