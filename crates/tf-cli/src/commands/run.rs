//! Run command implementation
//!
//! Executes one job of a tenant locally: the source and target databases
//! are DuckDB files and stage outputs are written as JSON files under the
//! storage directory.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tf_core::{JobDef, LocalObjectStore, PartitionKey, PipelineGraph, TenantConfig};
use tf_db::{Database, DuckDbBackend, StageOutput, StageRunner, UpsertOptions};

use crate::cli::{GlobalArgs, OutputFormat, RunArgs};
use crate::commands::common::{print_json, print_table};
use crate::context::TenantContext;

#[derive(Debug, Serialize)]
struct StageResult {
    stage: String,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<usize>,
}

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = TenantContext::load(global)?;
    let tenant = ctx.tenant(&args.tenant)?;
    let graph = ctx.graph(tenant, false)?;
    for violation in &graph.diagnostics {
        log::warn!("{}", violation);
    }

    let job = find_job(&graph, &args.job)?;
    let partition = args
        .date
        .as_deref()
        .map(PartitionKey::parse)
        .transpose()
        .context("Invalid --date")?;

    let runner = build_runner(args, tenant)?;
    let runs = runner
        .run_job(&graph, job, partition)
        .await
        .with_context(|| format!("Job {} failed", job.name))?;

    let results: Vec<StageResult> = runs
        .into_iter()
        .map(|run| {
            let (path, deleted) = match &run.output {
                StageOutput::Stored { path, .. } => (Some(path.clone()), None),
                StageOutput::Loaded(result) => (None, Some(result.deleted)),
                StageOutput::Inline(_) => (None, None),
            };
            StageResult {
                stage: run.stage.to_string(),
                rows: run.output.rows(),
                path,
                deleted,
            }
        })
        .collect();

    match args.output {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = results
                .iter()
                .map(|r| {
                    let detail = match (&r.path, r.deleted) {
                        (Some(path), _) => path.clone(),
                        (None, Some(deleted)) => format!("{} replaced", deleted),
                        (None, None) => "-".to_string(),
                    };
                    vec![r.stage.clone(), r.rows.to_string(), detail]
                })
                .collect();
            print_table(&["STAGE", "ROWS", "OUTPUT"], &rows);
            println!("\nJob {} completed: {} stages", job.name, results.len());
        }
    }
    Ok(())
}

/// Look a job up by full name or by the part between the tenant id and `_job`
fn find_job<'a>(graph: &'a PipelineGraph, name: &str) -> Result<&'a JobDef> {
    let full = format!("{}_{}_job", graph.tenant, name);
    graph
        .job(name)
        .or_else(|| graph.job(&full))
        .ok_or_else(|| {
            let known: Vec<&str> = graph.jobs.iter().map(|j| j.name.as_str()).collect();
            anyhow!(
                "Job '{}' not found for tenant '{}' (available: {})",
                name,
                graph.tenant,
                known.join(", ")
            )
        })
}

fn build_runner(args: &RunArgs, tenant: &TenantConfig) -> Result<StageRunner> {
    let Some(source_path) = args
        .source_db
        .clone()
        .or_else(|| tenant.source_database.path.clone())
    else {
        bail!(
            "No source database for tenant '{}': pass --source-db or set source_database.path",
            tenant.id
        );
    };
    let target_path = args
        .target_db
        .clone()
        .unwrap_or_else(|| tenant.target_database.path.clone());

    let source: Arc<dyn Database> = Arc::new(
        DuckDbBackend::new(&source_path)
            .with_context(|| format!("Failed to open source database {}", source_path))?,
    );
    let target: Arc<dyn Database> = Arc::new(
        DuckDbBackend::new(&target_path)
            .with_context(|| format!("Failed to open target database {}", target_path))?,
    );
    let store = Arc::new(LocalObjectStore::new(&args.storage_dir));

    let mut runner = StageRunner::new(tenant, source, target, store)
        .with_upsert_options(UpsertOptions {
            batch_size: args.batch_size,
            transactional: args.transactional,
        })
        .create_missing_tables(args.create_tables);
    if let Some(secs) = args.timeout_secs {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    Ok(runner)
}
