//! Stage nodes of a tenant's pipeline graph

use crate::custom_code::BindingOrigin;
use crate::identifier::{PipelineName, TenantId};
use crate::partition::Partitioning;
use crate::transform::Transform;
use serde::Serialize;
use std::fmt;

/// The three stages a pipeline can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Extract,
    Transfer,
    Load,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Extract => "extract",
            StageKind::Transfer => "transfer",
            StageKind::Load => "load",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<tenant>/<stage>/<pipeline>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn new(tenant: &TenantId, kind: StageKind, pipeline: &PipelineName) -> Self {
        Self(format!("{}/{}/{}", tenant, kind, pipeline))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for StageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Fully qualified target table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    pub schema: String,
    pub table: String,
}

impl TargetTable {
    pub fn new(
        catalog: Option<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Name parts in order, catalog first when present
    pub fn parts(&self) -> Vec<&str> {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = &self.catalog {
            parts.push(catalog.as_str());
        }
        parts.push(self.schema.as_str());
        parts.push(self.table.as_str());
        parts
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts().join("."))
    }
}

/// Stage-specific payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDetail {
    Extract {
        query: String,
        query_origin: BindingOrigin,
        #[serde(skip_serializing_if = "Option::is_none")]
        date_column: Option<String>,
        save_to_storage: bool,
    },
    Transfer {
        transform: Transform,
        transform_origin: BindingOrigin,
        inputs: Vec<PipelineName>,
    },
    Load {
        target: TargetTable,
        key_columns: Vec<String>,
        tenant_column: String,
        target_origin: BindingOrigin,
    },
}

/// One executable stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageNode {
    pub id: StageId,
    pub tenant: TenantId,
    pub pipeline: PipelineName,
    pub kind: StageKind,
    pub partitioning: Partitioning,
    pub upstream: Vec<StageId>,
    pub detail: StageDetail,
}

impl StageNode {
    pub fn is_partitioned(&self) -> bool {
        self.partitioning.is_partitioned()
    }
}
