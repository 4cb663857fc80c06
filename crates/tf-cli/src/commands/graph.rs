//! Graph command implementation

use anyhow::Result;
use tf_core::{PipelineGraph, StageDetail};

use crate::cli::{GlobalArgs, GraphArgs, OutputFormat};
use crate::commands::common::{join_or_dash, print_json, print_table};
use crate::context::TenantContext;

/// Execute the graph command
pub async fn execute(args: &GraphArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = TenantContext::load(global)?;
    let tenant = ctx.tenant(&args.tenant)?;
    let graph = ctx.graph(tenant, args.strict)?;

    match args.output {
        OutputFormat::Json => print_json(&graph)?,
        OutputFormat::Table => print_graph(&graph)?,
    }
    Ok(())
}

fn print_graph(graph: &PipelineGraph) -> Result<()> {
    println!(
        "Tenant {} ({} environment)\n",
        graph.tenant, graph.environment
    );

    let rows: Vec<Vec<String>> = graph
        .topological_nodes()?
        .into_iter()
        .map(|node| {
            vec![
                node.id.to_string(),
                node.partitioning.to_string(),
                describe(&node.detail),
                join_or_dash(node.upstream.iter().map(|id| id.as_str())),
            ]
        })
        .collect();
    print_table(&["STAGE", "PARTITIONING", "DETAIL", "UPSTREAM"], &rows);

    println!();
    let jobs: Vec<Vec<String>> = graph
        .jobs
        .iter()
        .map(|job| {
            let schedule = graph
                .schedules
                .iter()
                .find(|s| s.job == job.name)
                .map(|s| format!("{} {}", s.cron, s.timezone))
                .unwrap_or_else(|| "-".to_string());
            vec![job.name.clone(), job.stages.len().to_string(), schedule]
        })
        .collect();
    print_table(&["JOB", "STAGES", "SCHEDULE"], &jobs);

    if !graph.diagnostics.is_empty() {
        println!();
        for violation in &graph.diagnostics {
            println!("warning: {}", violation);
        }
    }
    Ok(())
}

fn describe(detail: &StageDetail) -> String {
    match detail {
        StageDetail::Extract {
            query_origin,
            save_to_storage,
            ..
        } => format!(
            "{} query{}",
            query_origin,
            if *save_to_storage { ", stored" } else { "" }
        ),
        StageDetail::Transfer {
            transform, inputs, ..
        } => format!(
            "{} <- {}",
            transform.name(),
            join_or_dash(inputs.iter().map(|p| p.as_str()))
        ),
        StageDetail::Load {
            target,
            key_columns,
            ..
        } => format!("{} by ({})", target, key_columns.join(", ")),
    }
}
