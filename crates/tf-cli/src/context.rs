//! Runtime context for CLI commands

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tf_core::{
    ConfigLoader, DirectoryBindingSource, GraphBuilder, PipelineGraph, TenantConfig, TenantId,
    TransformCatalog,
};

use crate::cli::GlobalArgs;

/// Loaded tenants plus the graph builder bound to their custom code
pub(crate) struct TenantContext {
    pub loader: ConfigLoader,
    pub tenants: BTreeMap<TenantId, TenantConfig>,
    pub environment: String,
    catalog: Arc<TransformCatalog>,
}

impl TenantContext {
    /// Load every tenant enabled for the selected environment
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let loader = ConfigLoader::new(&global.tenants_dir);
        let tenants = loader.load_all(&global.environment);
        log::debug!(
            "Loaded {} tenants from {} for environment '{}'",
            tenants.len(),
            global.tenants_dir,
            global.environment
        );
        Ok(Self {
            loader,
            tenants,
            environment: global.environment.clone(),
            catalog: Arc::new(TransformCatalog::with_defaults()),
        })
    }

    /// An enabled tenant by id
    pub fn tenant(&self, id: &str) -> Result<&TenantConfig> {
        self.tenants.get(id).ok_or_else(|| {
            anyhow!(
                "Tenant '{}' not found or not enabled for environment '{}' in {}",
                id,
                self.environment,
                self.loader.tenants_dir().display()
            )
        })
    }

    /// Graph builder reading `custom.yaml` bindings next to tenant configs
    pub fn builder(&self, strict: bool) -> GraphBuilder {
        let source = DirectoryBindingSource::new(self.loader.tenants_dir(), self.catalog.clone());
        GraphBuilder::new(Arc::new(source), self.catalog.clone()).strict(strict)
    }

    pub fn graph(&self, tenant: &TenantConfig, strict: bool) -> Result<PipelineGraph> {
        self.builder(strict)
            .build(tenant, &self.environment)
            .with_context(|| format!("Failed to build pipeline graph for tenant '{}'", tenant.id))
    }
}
