//! Shared default registry
//!
//! Pipelines, extract queries, transforms and load configs used by every
//! tenant that does not provide its own. Lookups here sit between a
//! tenant's custom binding and the generic per-name fallback.

use crate::config::{DEFAULT_TENANT_COLUMN, SNAPSHOT_DATE_COLUMN};
use crate::identifier::PipelineName;
use crate::pipeline::{LoadConfig, PipelineConfig};
use std::collections::BTreeMap;

/// Catalog name of the shared lot filter applied to `lot_history`
pub const ACTIVE_LOTS_TRANSFORM: &str = "active_lots";

/// Catalog name of the identity transform
pub const PASSTHROUGH_TRANSFORM: &str = "passthrough";

const LOT_HISTORY_QUERY: &str = "SELECT lot_id, product_code, process_step, equipment_id, \
start_time, end_time, quantity, status, created_at FROM lot_history";

const EQUIPMENT_EVENT_QUERY: &str = "SELECT event_id, equipment_id, event_type, event_time, \
duration_minutes, description, created_at FROM equipment_event";

const PROCESS_RESULT_QUERY: &str = "SELECT result_id, lot_id, process_step, measurement_value, \
spec_lower, spec_upper, pass_fail, measured_at FROM process_result";

const ITEM_MASTER_QUERY: &str = "SELECT item_id, item_type, item_name, item_group_id, \
description, item_priority, procurement_type, create_datetime, update_datetime FROM item_master";

/// Pipelines built for a tenant whose pipeline map is empty
pub fn default_pipelines() -> BTreeMap<PipelineName, PipelineConfig> {
    let mut pipelines = BTreeMap::new();

    let mut lot_history = PipelineConfig::new("lot_history");
    lot_history.date_column = Some("DATE(created_at)".to_string());
    lot_history.has_transfer = true;
    lot_history.save_to_target = true;
    insert(&mut pipelines, "lot_history", lot_history);

    let mut equipment_event = PipelineConfig::new("equipment_event");
    equipment_event.date_column = Some("DATE(event_time)".to_string());
    insert(&mut pipelines, "equipment_event", equipment_event);

    let mut process_result = PipelineConfig::new("process_result");
    process_result.date_column = Some("DATE(measured_at)".to_string());
    insert(&mut pipelines, "process_result", process_result);

    let mut item_master = PipelineConfig::new("item_master");
    item_master.save_to_target = true;
    insert(&mut pipelines, "item_master", item_master);

    pipelines
}

fn insert(
    pipelines: &mut BTreeMap<PipelineName, PipelineConfig>,
    name: &str,
    config: PipelineConfig,
) {
    if let Ok(name) = PipelineName::try_new(name) {
        pipelines.insert(name, config);
    }
}

/// Shared extract query for a pipeline name
pub fn shared_query(pipeline: &str) -> Option<&'static str> {
    match pipeline {
        "lot_history" => Some(LOT_HISTORY_QUERY),
        "equipment_event" => Some(EQUIPMENT_EVENT_QUERY),
        "process_result" => Some(PROCESS_RESULT_QUERY),
        "item_master" => Some(ITEM_MASTER_QUERY),
        _ => None,
    }
}

/// Catalog name of the shared transform for a pipeline name
pub fn shared_transform(pipeline: &str) -> Option<&'static str> {
    match pipeline {
        "lot_history" => Some(ACTIVE_LOTS_TRANSFORM),
        _ => None,
    }
}

/// Shared target descriptor for a pipeline name
pub fn shared_load_config(pipeline: &str) -> Option<LoadConfig> {
    match pipeline {
        "lot_history" => Some(LoadConfig::new(
            "lot_snapshot",
            "aps",
            [DEFAULT_TENANT_COLUMN, SNAPSHOT_DATE_COLUMN, "lot_id"],
        )),
        "item_master" => Some(LoadConfig::new(
            "item_master",
            "aps",
            [DEFAULT_TENANT_COLUMN, "item_id"],
        )),
        _ => None,
    }
}

/// Generic extract query synthesised from the pipeline name
pub fn fallback_query(pipeline: &str) -> String {
    format!("SELECT * FROM {pipeline}")
}

/// Generic target descriptor synthesised from the pipeline name
pub fn fallback_load_config(pipeline: &str, tenant_column: &str) -> LoadConfig {
    LoadConfig::new(pipeline, "public", [tenant_column, SNAPSHOT_DATE_COLUMN])
}
