//! Tenants command implementation

use anyhow::Result;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, TenantsArgs};
use crate::commands::common::{join_or_dash, print_json, print_table};
use crate::context::TenantContext;

#[derive(Debug, Serialize)]
struct TenantInfo {
    id: String,
    name: String,
    pipelines: Vec<String>,
    default_pipelines: bool,
    custom_code: bool,
    storage_base_path: String,
}

/// Execute the tenants command
pub async fn execute(args: &TenantsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = TenantContext::load(global)?;
    let builder = ctx.builder(false);

    let infos: Vec<TenantInfo> = ctx
        .tenants
        .values()
        .map(|tenant| TenantInfo {
            id: tenant.id.to_string(),
            name: tenant.name.clone(),
            pipelines: tenant
                .effective_pipelines()
                .keys()
                .map(|p| p.to_string())
                .collect(),
            default_pipelines: tenant.pipelines.is_empty(),
            custom_code: builder.resolver_for(tenant).has_custom_code(),
            storage_base_path: tenant.storage_base_path(),
        })
        .collect();

    match args.output {
        OutputFormat::Json => print_json(&infos)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = infos
                .iter()
                .map(|info| {
                    vec![
                        info.id.clone(),
                        info.name.clone(),
                        join_or_dash(&info.pipelines),
                        if info.custom_code { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["TENANT", "NAME", "PIPELINES", "CUSTOM_CODE"], &rows);
            println!(
                "\n{} tenants enabled for environment '{}'",
                infos.len(),
                ctx.environment
            );
        }
    }
    Ok(())
}
