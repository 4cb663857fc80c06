//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// tenantflow - multi-tenant ETL pipeline configuration and execution
#[derive(Parser, Debug)]
#[command(name = "tf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding tenant folders and legacy tenant_*.yaml files
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "TF_TENANTS_DIR",
        default_value = "tenants"
    )]
    pub tenants_dir: String,

    /// Deployment environment tenants are filtered and resolved for
    #[arg(
        short,
        long,
        global = true,
        env = "TF_ENVIRONMENT",
        default_value = "dev"
    )]
    pub environment: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tenants enabled for the environment
    Tenants(TenantsArgs),

    /// Show a tenant's stage graph, jobs and schedules
    Graph(GraphArgs),

    /// Validate every tenant document and its pipeline graph
    Validate(ValidateArgs),

    /// Run one job of a tenant against local DuckDB databases
    Run(RunArgs),
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON on stdout
    Json,
}

/// Arguments for the tenants command
#[derive(Args, Debug)]
pub struct TenantsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the graph command
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Tenant id
    pub tenant: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Fail instead of dropping stages with configuration violations
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Only validate this tenant
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Treat dropped stages as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tenant id
    pub tenant: String,

    /// Job to run: full name (acme_daily_etl_job) or suffix (daily_etl)
    #[arg(short, long, default_value = "daily_etl")]
    pub job: String,

    /// Partition date (YYYY-MM-DD) for daily jobs
    #[arg(long)]
    pub date: Option<String>,

    /// Source DuckDB file; defaults to source_database.path
    #[arg(long)]
    pub source_db: Option<String>,

    /// Target DuckDB file; defaults to target_database.path
    #[arg(long)]
    pub target_db: Option<String>,

    /// Root directory for stage outputs
    #[arg(long, default_value = ".tenantflow/storage")]
    pub storage_dir: String,

    /// Per-operation time limit in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Rows per upsert statement
    #[arg(long, default_value_t = tf_db::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Wrap each upsert sub-batch in a transaction
    #[arg(long)]
    pub transactional: bool,

    /// Create missing target tables from the loaded batch
    #[arg(long)]
    pub create_tables: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
