//! Validate command implementation
//!
//! Unlike the other commands, every tenant document is checked, including
//! tenants disabled for the selected environment.

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::ExitStatus;
use crate::context::TenantContext;

#[derive(Default)]
struct Summary {
    checked: usize,
    errors: usize,
    warnings: usize,
}

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = TenantContext::load(global)?;
    let builder = ctx.builder(args.strict);
    let only = args.tenant.as_deref();

    println!(
        "Validating tenants in {} for environment '{}'\n",
        ctx.loader.tenants_dir().display(),
        ctx.environment
    );

    let mut summary = Summary::default();
    let mut seen = HashSet::new();

    for path in ctx.loader.documents() {
        let tenant = match ctx.loader.load_tenant(&path) {
            Ok(tenant) => tenant,
            Err(e) => {
                if only.is_some_and(|id| !mentions(ctx.loader.tenants_dir(), &path, id)) {
                    continue;
                }
                summary.errors += 1;
                println!("error: {}: {}", path.display(), e);
                continue;
            }
        };
        if only.is_some_and(|id| tenant.id.as_str() != id) {
            continue;
        }
        summary.checked += 1;

        if !seen.insert(tenant.id.clone()) {
            summary.warnings += 1;
            println!(
                "warning: {}: duplicate tenant id '{}' is ignored",
                path.display(),
                tenant.id
            );
            continue;
        }

        match builder.build(&tenant, &ctx.environment) {
            Ok(graph) => {
                for violation in &graph.diagnostics {
                    summary.warnings += 1;
                    println!("warning: [{}] {}", tenant.id, violation);
                }
                println!(
                    "ok: {} ({} stages, {} jobs{})",
                    tenant.id,
                    graph.nodes.len(),
                    graph.jobs.len(),
                    if tenant.is_enabled_for_environment(&ctx.environment) {
                        ""
                    } else {
                        ", disabled"
                    }
                );
            }
            Err(e) => {
                summary.errors += 1;
                println!("error: [{}] {}", tenant.id, e);
            }
        }
    }

    if let Some(id) = only {
        if summary.checked == 0 && summary.errors == 0 {
            println!("error: tenant '{}' not found", id);
            summary.errors += 1;
        }
    }

    println!();
    if summary.errors == 0 {
        println!(
            "Validation passed: {} tenants, {} errors, {} warnings",
            summary.checked, summary.errors, summary.warnings
        );
        Ok(())
    } else {
        println!(
            "Validation failed: {} tenants, {} errors, {} warnings",
            summary.checked, summary.errors, summary.warnings
        );
        Err(ExitStatus(1).into())
    }
}

/// Whether a broken document plausibly belongs to tenant `id`
fn mentions(root: &Path, path: &Path, id: &str) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().contains(id))
}
