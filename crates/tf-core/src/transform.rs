//! Transform functions and the catalog that names them
//!
//! Tenant bindings refer to transforms by catalog name, so YAML documents
//! can select business logic without the loader executing code.

use crate::config::SNAPSHOT_DATE_COLUMN;
use crate::defaults::{ACTIVE_LOTS_TRANSFORM, PASSTHROUGH_TRANSFORM};
use crate::error::{CoreError, CoreResult};
use crate::identifier::{PipelineName, TenantId};
use crate::partition::PartitionKey;
use crate::table::{Table, Value};
use crate::validation::{TableValidator, ValidationReport};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Everything a transform sees for one invocation
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    pub tenant: &'a TenantId,
    pub pipeline: &'a PipelineName,
    /// `None` for unpartitioned (latest) runs
    pub partition: Option<PartitionKey>,
    /// Upstream extracts keyed by pipeline name
    pub inputs: &'a BTreeMap<PipelineName, Table>,
}

impl<'a> TransformInput<'a> {
    /// The only input, or the one named after the pipeline itself
    pub fn primary(&self) -> CoreResult<&'a Table> {
        if let Some(table) = self.inputs.get(self.pipeline) {
            return Ok(table);
        }
        let mut tables = self.inputs.values();
        match (tables.next(), tables.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(self.fail("transform received no inputs")),
            _ => Err(self.fail("ambiguous inputs: none is named after the pipeline")),
        }
    }

    /// Build a [`CoreError::TransformFailed`] for this invocation
    pub fn fail(&self, message: impl Into<String>) -> CoreError {
        CoreError::TransformFailed {
            pipeline: self.pipeline.to_string(),
            message: message.into(),
        }
    }
}

type TransformFn = dyn Fn(&TransformInput<'_>) -> CoreResult<Table> + Send + Sync;

/// A named, shareable transform function
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
}

impl Transform {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&TransformInput<'_>) -> CoreResult<Table> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, input: &TransformInput<'_>) -> CoreResult<Table> {
        (self.func)(input)
    }

    /// Concatenate the inputs and stamp the partition date
    pub fn passthrough() -> Self {
        Self::new(PASSTHROUGH_TRANSFORM, passthrough)
    }

    /// Keep lots that are in progress or completed and stamp the partition date
    pub fn active_lots() -> Self {
        Self::new(ACTIVE_LOTS_TRANSFORM, active_lots)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transform").field(&self.name).finish()
    }
}

/// Transforms compare by name; two graphs built from the same inputs bind
/// the same catalog entries.
impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Transform {}

impl Serialize for Transform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

fn stamp_partition(table: &mut Table, partition: Option<PartitionKey>) {
    if let Some(partition) = partition {
        table.set_constant_column(SNAPSHOT_DATE_COLUMN, Value::Date(partition.date()));
    }
}

fn passthrough(input: &TransformInput<'_>) -> CoreResult<Table> {
    let mut tables = input.inputs.values();
    let Some(first) = tables.next() else {
        return Err(input.fail("transform received no inputs"));
    };
    let mut out = first.clone();
    for table in tables {
        if table.columns() != out.columns() {
            return Err(input.fail(format!(
                "cannot concatenate inputs with different columns: {:?} vs {:?}",
                out.columns(),
                table.columns()
            )));
        }
        for row in table.rows() {
            out.push_row(row.clone())?;
        }
    }
    stamp_partition(&mut out, input.partition);
    Ok(out)
}

const ACTIVE_STATUSES: [&str; 2] = ["IN_PROGRESS", "COMPLETED"];

fn active_lots(input: &TransformInput<'_>) -> CoreResult<Table> {
    let mut out = input.primary()?.clone();
    let Some(status_idx) = out.column_index("status") else {
        return Err(input.fail("input has no 'status' column"));
    };
    out.retain_rows(|_, row| {
        row[status_idx]
            .as_str()
            .is_some_and(|s| ACTIVE_STATUSES.contains(&s))
    });
    stamp_partition(&mut out, input.partition);
    check_active_lots(&out).warn_failures(&format!("{}/{}", input.tenant, input.pipeline));
    Ok(out)
}

/// Quality checks on the output of `active_lots`; failures are warnings only
fn check_active_lots(table: &Table) -> ValidationReport {
    let mut validator = TableValidator::new(table).check_not_null("lot_id");
    if table.column_index("quantity").is_some() {
        validator = validator.check_range("quantity", Some(0.0), None);
    }
    validator.validate()
}

/// Registry of transforms addressable by name
#[derive(Debug, Clone)]
pub struct TransformCatalog {
    transforms: BTreeMap<String, Transform>,
}

impl TransformCatalog {
    /// An empty catalog
    pub fn empty() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    /// Catalog holding the shared transforms
    pub fn with_defaults() -> Self {
        let mut catalog = Self::empty();
        catalog.register(Transform::passthrough());
        catalog.register(Transform::active_lots());
        catalog
    }

    /// Add or replace a transform under its own name
    pub fn register(&mut self, transform: Transform) {
        self.transforms.insert(transform.name.clone(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    /// Look up a transform, failing for unknown names
    pub fn require(&self, name: &str) -> CoreResult<Transform> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownTransform {
                name: name.to_string(),
            })
    }
}

impl Default for TransformCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
