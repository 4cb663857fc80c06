//! Tenant document discovery and loading

use crate::config::TenantConfig;
use crate::error::{CoreError, CoreResult};
use crate::identifier::TenantId;
use crate::interpolate::{interpolate_value, process_env};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of a tenant document inside its folder
pub const TENANT_CONFIG_FILE: &str = "config.yaml";

/// Prefix of flat legacy tenant documents (`tenant_<id>.yaml`)
pub const LEGACY_PREFIX: &str = "tenant_";

/// Variable lookup used for placeholder interpolation
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// How a tenant document was laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Folder,
    Legacy,
}

/// Discovers and parses tenant documents under one directory.
///
/// Two layouts are recognised: `<dir>/<tenant>/config.yaml` and the flat
/// legacy `<dir>/tenant_<id>.yaml`. Entries starting with `_` or `.` are
/// templates or hidden and are never loaded.
#[derive(Clone)]
pub struct ConfigLoader {
    tenants_dir: PathBuf,
    env_lookup: EnvLookup,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("tenants_dir", &self.tenants_dir)
            .finish_non_exhaustive()
    }
}

impl ConfigLoader {
    /// Loader resolving placeholders against the process environment
    pub fn new(tenants_dir: impl Into<PathBuf>) -> Self {
        Self {
            tenants_dir: tenants_dir.into(),
            env_lookup: Arc::new(process_env),
        }
    }

    /// Replace the variable lookup used for `${NAME}` placeholders
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Arc::new(lookup);
        self
    }

    pub fn tenants_dir(&self) -> &Path {
        &self.tenants_dir
    }

    /// Folder of a tenant using the folder layout, if it exists
    pub fn tenant_dir(&self, id: &TenantId) -> Option<PathBuf> {
        let dir = self.tenants_dir.join(id.as_str());
        dir.is_dir().then_some(dir)
    }

    /// Load every valid tenant enabled for `environment`.
    ///
    /// Documents that fail to parse or validate are logged and skipped so
    /// one broken tenant never hides the others. A folder-layout document
    /// wins over a legacy file declaring the same id.
    pub fn load_all(&self, environment: &str) -> BTreeMap<TenantId, TenantConfig> {
        let mut tenants: BTreeMap<TenantId, (TenantConfig, Layout)> = BTreeMap::new();

        for (path, layout) in self.discover() {
            let config = match self.load_tenant(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Skipping tenant document {}: {}", path.display(), e);
                    continue;
                }
            };

            match tenants.get(&config.id) {
                Some((_, Layout::Folder)) if layout == Layout::Legacy => {
                    log::debug!(
                        "Ignoring legacy document {} for tenant '{}': folder layout takes precedence",
                        path.display(),
                        config.id
                    );
                    continue;
                }
                Some((_, existing)) if *existing == layout => {
                    log::warn!(
                        "Duplicate tenant id '{}' in {}; keeping the first definition",
                        config.id,
                        path.display()
                    );
                    continue;
                }
                _ => {}
            }
            tenants.insert(config.id.clone(), (config, layout));
        }

        tenants
            .into_iter()
            .filter(|(id, (config, _))| {
                let enabled = config.is_enabled_for_environment(environment);
                if !enabled {
                    log::info!("Tenant '{}' is disabled for environment '{}'", id, environment);
                }
                enabled
            })
            .map(|(id, (config, _))| (id, config))
            .collect()
    }

    /// Read, interpolate, parse and validate one tenant document
    pub fn load_tenant(&self, path: &Path) -> CoreResult<TenantConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let resolved = interpolate_value(raw, self.env_lookup.as_ref());
        TenantConfig::from_yaml_value(resolved).map_err(|e| match e {
            CoreError::YamlParse(inner) => CoreError::ConfigParseError {
                path: path.display().to_string(),
                message: inner.to_string(),
            },
            other => other,
        })
    }

    /// Paths of every tenant document that would be considered, folder
    /// layout first
    pub fn documents(&self) -> Vec<PathBuf> {
        self.discover().into_iter().map(|(path, _)| path).collect()
    }

    /// Candidate documents, folder layout first, each layout in name order
    fn discover(&self) -> Vec<(PathBuf, Layout)> {
        let entries = match std::fs::read_dir(&self.tenants_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Tenant config directory {} is not readable: {}",
                    self.tenants_dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut folders = Vec::new();
        let mut legacy = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_hidden_or_template(&name) {
                continue;
            }
            if path.is_dir() {
                let config = path.join(TENANT_CONFIG_FILE);
                if config.is_file() {
                    folders.push(config);
                }
            } else if is_legacy_document(&name) {
                legacy.push(path);
            }
        }
        folders.sort();
        legacy.sort();

        folders
            .into_iter()
            .map(|p| (p, Layout::Folder))
            .chain(legacy.into_iter().map(|p| (p, Layout::Legacy)))
            .collect()
    }
}

fn is_hidden_or_template(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

fn is_legacy_document(name: &str) -> bool {
    name.starts_with(LEGACY_PREFIX) && (name.ends_with(".yaml") || name.ends_with(".yml"))
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
