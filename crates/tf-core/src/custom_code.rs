//! Tenant custom-code bindings and their resolution against shared defaults
//!
//! Every lookup follows the same precedence: a non-null entry in the
//! tenant's binding, then the shared default registry, then a generic
//! fallback synthesised from the pipeline name. A binding that fails to
//! load is logged and treated as absent; graph construction never fails
//! because of it.

use crate::defaults::{
    fallback_load_config, fallback_query, shared_load_config, shared_query, shared_transform,
};
use crate::error::{CoreError, CoreResult};
use crate::identifier::{PipelineName, TenantId};
use crate::pipeline::LoadConfig;
use crate::transform::{Transform, TransformCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// File holding a tenant's custom binding in the folder layout
pub const CUSTOM_CODE_FILE: &str = "custom.yaml";

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Declared inline in the pipeline configuration
    Pipeline,
    /// The tenant's custom binding
    Tenant,
    /// The shared default registry
    Shared,
    /// Synthesised from the pipeline name
    Fallback,
}

impl std::fmt::Display for BindingOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BindingOrigin::Pipeline => "pipeline",
            BindingOrigin::Tenant => "tenant",
            BindingOrigin::Shared => "shared",
            BindingOrigin::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A resolved value tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub origin: BindingOrigin,
}

impl<T> Resolved<T> {
    fn new(value: T, origin: BindingOrigin) -> Self {
        Self { value, origin }
    }
}

/// Per-tenant overrides. A `None` entry explicitly defers to the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomCodeBinding {
    pub queries: BTreeMap<String, Option<String>>,
    pub transforms: BTreeMap<String, Option<Transform>>,
    pub load_configs: BTreeMap<String, Option<LoadConfig>>,
}

impl CustomCodeBinding {
    /// Whether any entry actually overrides something
    pub fn provides_anything(&self) -> bool {
        self.queries.values().any(Option::is_some)
            || self.transforms.values().any(Option::is_some)
            || self.load_configs.values().any(Option::is_some)
    }

    pub fn with_query(mut self, pipeline: &str, query: impl Into<String>) -> Self {
        self.queries.insert(pipeline.to_string(), Some(query.into()));
        self
    }

    pub fn with_transform(mut self, pipeline: &str, transform: Transform) -> Self {
        self.transforms.insert(pipeline.to_string(), Some(transform));
        self
    }

    pub fn with_load_config(mut self, pipeline: &str, config: LoadConfig) -> Self {
        self.load_configs.insert(pipeline.to_string(), Some(config));
        self
    }
}

/// Supplies custom bindings for tenants.
///
/// `Ok(None)` means the tenant has no custom code; `Err` is a broken
/// binding, which the resolver downgrades to a warning.
pub trait BindingSource: Send + Sync {
    fn load(&self, tenant: &TenantId) -> CoreResult<Option<CustomCodeBinding>>;
}

/// Compiled-in bindings keyed by tenant
#[derive(Debug, Clone, Default)]
pub struct StaticBindingSource {
    bindings: BTreeMap<TenantId, CustomCodeBinding>,
}

impl StaticBindingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, tenant: TenantId, binding: CustomCodeBinding) -> Self {
        self.bindings.insert(tenant, binding);
        self
    }
}

impl BindingSource for StaticBindingSource {
    fn load(&self, tenant: &TenantId) -> CoreResult<Option<CustomCodeBinding>> {
        Ok(self.bindings.get(tenant).cloned())
    }
}

/// On-disk shape of `custom.yaml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomCodeDocument {
    #[serde(default)]
    queries: BTreeMap<String, Option<String>>,

    /// SQL files relative to the tenant folder
    #[serde(default)]
    query_files: BTreeMap<String, Option<PathBuf>>,

    /// Catalog transform names
    #[serde(default)]
    transforms: BTreeMap<String, Option<String>>,

    #[serde(default)]
    load_configs: BTreeMap<String, Option<LoadConfig>>,
}

/// Reads `<tenants_dir>/<tenant>/custom.yaml`
#[derive(Debug, Clone)]
pub struct DirectoryBindingSource {
    tenants_dir: PathBuf,
    catalog: Arc<TransformCatalog>,
}

impl DirectoryBindingSource {
    pub fn new(tenants_dir: impl Into<PathBuf>, catalog: Arc<TransformCatalog>) -> Self {
        Self {
            tenants_dir: tenants_dir.into(),
            catalog,
        }
    }

    fn binding_error(tenant: &TenantId, message: impl Into<String>) -> CoreError {
        CoreError::CustomCodeLoad {
            tenant: tenant.to_string(),
            message: message.into(),
        }
    }

    fn read_query_file(tenant: &TenantId, tenant_dir: &Path, file: &Path) -> CoreResult<String> {
        let path = tenant_dir.join(file);
        std::fs::read_to_string(&path).map_err(|e| {
            Self::binding_error(tenant, format!("cannot read {}: {}", path.display(), e))
        })
    }
}

impl BindingSource for DirectoryBindingSource {
    fn load(&self, tenant: &TenantId) -> CoreResult<Option<CustomCodeBinding>> {
        let tenant_dir = self.tenants_dir.join(tenant.as_str());
        let path = tenant_dir.join(CUSTOM_CODE_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Self::binding_error(tenant, format!("cannot read {}: {}", path.display(), e))
        })?;
        let doc: CustomCodeDocument = serde_yaml::from_str(&content)
            .map_err(|e| Self::binding_error(tenant, format!("{}: {}", path.display(), e)))?;

        let mut binding = CustomCodeBinding {
            queries: doc.queries,
            ..CustomCodeBinding::default()
        };

        for (name, file) in doc.query_files {
            if binding.queries.get(&name).is_some_and(Option::is_some) {
                return Err(Self::binding_error(
                    tenant,
                    format!("query for '{name}' declared both inline and as a file"),
                ));
            }
            let query = match file {
                Some(file) => Some(Self::read_query_file(tenant, &tenant_dir, &file)?),
                None => None,
            };
            binding.queries.insert(name, query);
        }

        for (name, transform) in doc.transforms {
            let transform = match transform {
                Some(transform_name) => Some(
                    self.catalog
                        .require(&transform_name)
                        .map_err(|e| Self::binding_error(tenant, e.to_string()))?,
                ),
                None => None,
            };
            binding.transforms.insert(name, transform);
        }

        for (name, config) in &doc.load_configs {
            if let Some(config) = config {
                config
                    .validate()
                    .map_err(|msg| Self::binding_error(tenant, format!("load config '{name}': {msg}")))?;
            }
        }
        binding.load_configs = doc.load_configs;

        Ok(Some(binding))
    }
}

/// Resolves queries, transforms and load configs for one tenant.
///
/// The binding is loaded at most once per resolver instance; [`reload`]
/// drops the cached binding so the next lookup reads it again.
///
/// [`reload`]: CustomCodeResolver::reload
pub struct CustomCodeResolver {
    tenant: TenantId,
    tenant_column: String,
    source: Arc<dyn BindingSource>,
    catalog: Arc<TransformCatalog>,
    binding: OnceLock<Option<CustomCodeBinding>>,
}

impl std::fmt::Debug for CustomCodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCodeResolver")
            .field("tenant", &self.tenant)
            .field("loaded", &self.binding.get().is_some())
            .finish_non_exhaustive()
    }
}

impl CustomCodeResolver {
    pub fn new(
        tenant: TenantId,
        tenant_column: impl Into<String>,
        source: Arc<dyn BindingSource>,
        catalog: Arc<TransformCatalog>,
    ) -> Self {
        Self {
            tenant,
            tenant_column: tenant_column.into(),
            source,
            catalog,
            binding: OnceLock::new(),
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Drop the cached binding; the next lookup loads it again
    pub fn reload(&mut self) {
        self.binding = OnceLock::new();
    }

    fn binding(&self) -> Option<&CustomCodeBinding> {
        self.binding
            .get_or_init(|| match self.source.load(&self.tenant) {
                Ok(binding) => binding,
                Err(e) => {
                    log::warn!(
                        "Custom code for tenant '{}' unavailable, using defaults: {}",
                        self.tenant,
                        e
                    );
                    None
                }
            })
            .as_ref()
    }

    /// Whether the tenant's binding overrides anything at all
    pub fn has_custom_code(&self) -> bool {
        self.binding().is_some_and(CustomCodeBinding::provides_anything)
    }

    /// Extract query: tenant → shared → `SELECT * FROM <name>`
    pub fn query_for(&self, pipeline: &PipelineName) -> Resolved<String> {
        if let Some(query) = self
            .binding()
            .and_then(|b| b.queries.get(pipeline.as_str()))
            .and_then(Option::as_ref)
        {
            return Resolved::new(query.clone(), BindingOrigin::Tenant);
        }
        match shared_query(pipeline) {
            Some(query) => Resolved::new(query.to_string(), BindingOrigin::Shared),
            None => Resolved::new(fallback_query(pipeline), BindingOrigin::Fallback),
        }
    }

    /// Transform: tenant → shared → passthrough
    pub fn transform_for(&self, pipeline: &PipelineName) -> Resolved<Transform> {
        if let Some(transform) = self
            .binding()
            .and_then(|b| b.transforms.get(pipeline.as_str()))
            .and_then(Option::as_ref)
        {
            return Resolved::new(transform.clone(), BindingOrigin::Tenant);
        }
        if let Some(transform) = shared_transform(pipeline).and_then(|name| self.catalog.get(name)) {
            return Resolved::new(transform.clone(), BindingOrigin::Shared);
        }
        Resolved::new(Transform::passthrough(), BindingOrigin::Fallback)
    }

    /// Target descriptor: tenant → shared → `{name, public, [tenant, snapshot_date]}`
    pub fn load_config_for(&self, pipeline: &PipelineName) -> Resolved<LoadConfig> {
        if let Some(config) = self
            .binding()
            .and_then(|b| b.load_configs.get(pipeline.as_str()))
            .and_then(Option::as_ref)
        {
            return Resolved::new(config.clone(), BindingOrigin::Tenant);
        }
        match shared_load_config(pipeline) {
            Some(config) => Resolved::new(config, BindingOrigin::Shared),
            None => Resolved::new(
                fallback_load_config(pipeline, &self.tenant_column),
                BindingOrigin::Fallback,
            ),
        }
    }
}

#[cfg(test)]
#[path = "custom_code_test.rs"]
mod tests;
