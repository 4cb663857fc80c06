use super::*;
use crate::custom_code::CustomCodeBinding;
use crate::job::ScheduleStatus;
use crate::pipeline::LoadConfig;

fn tenant_from(yaml: &str) -> TenantConfig {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    TenantConfig::from_yaml_value(value).unwrap()
}

const ACME: &str = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  lot_history:
    source_table: lot_history
    date_column: DATE(created_at)
    has_transfer: true
    save_to_target: true
    target:
      table: lot_snapshot
      schema: aps
      key_columns: [tenant_id, snapshot_date]
"#;

fn ids(graph: &PipelineGraph) -> Vec<&str> {
    graph.nodes.iter().map(|n| n.id.as_str()).collect()
}

#[test]
fn test_acme_lot_history_linear_chain() {
    let tenant = tenant_from(ACME);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();

    assert_eq!(
        ids(&graph),
        vec![
            "acme/extract/lot_history",
            "acme/transfer/lot_history",
            "acme/load/lot_history"
        ]
    );
    assert!(graph.diagnostics.is_empty());
    assert!(graph.nodes.iter().all(StageNode::is_partitioned));

    let transfer = graph.node("acme/transfer/lot_history").unwrap();
    assert_eq!(transfer.upstream, vec![graph.nodes[0].id.clone()]);
    let load = graph.node("acme/load/lot_history").unwrap();
    assert_eq!(load.upstream, vec![transfer.id.clone()]);
    assert_eq!(graph.edges.len(), 2);

    match &load.detail {
        StageDetail::Load {
            target,
            key_columns,
            tenant_column,
            target_origin,
        } => {
            assert_eq!(target.to_string(), "aps.lot_snapshot");
            assert_eq!(key_columns, &vec!["tenant_id", "snapshot_date"]);
            assert_eq!(tenant_column, "tenant_id");
            assert_eq!(*target_origin, BindingOrigin::Pipeline);
        }
        other => panic!("expected load detail, got {other:?}"),
    }
    match &transfer.detail {
        StageDetail::Transfer {
            transform,
            transform_origin,
            ..
        } => {
            assert_eq!(transform.name(), "active_lots");
            assert_eq!(*transform_origin, BindingOrigin::Shared);
        }
        other => panic!("expected transfer detail, got {other:?}"),
    }
}

#[test]
fn test_unpartitioned_pipeline_marks_every_node() {
    let tenant = tenant_from(
        r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  item_master:
    source_table: item_master
    has_transfer: true
    save_to_target: true
"#,
    );
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();
    assert_eq!(graph.nodes.len(), 3);
    assert!(graph.nodes.iter().all(|n| !n.is_partitioned()));

    let names: Vec<&str> = graph.jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["acme_reference_sync_job"]);
}

#[test]
fn test_extract_query_precedence() {
    let tenant = tenant_from(
        r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  lot_history:
    source_table: lot_history
  inline:
    source_table: raw_inline
    query: SELECT 1 AS x
  wip:
    source_table: mes_wip
  custom:
    source_table: custom_src
"#,
    );
    let binding = CustomCodeBinding::default().with_query("custom", "SELECT * FROM tenant_view");
    let source = StaticBindingSource::new().with_binding(tenant.id.clone(), binding);
    let builder = GraphBuilder::new(Arc::new(source), Arc::new(TransformCatalog::with_defaults()));
    let graph = builder.build(&tenant, "prod").unwrap();

    let query = |id: &str| match &graph.node(id).unwrap().detail {
        StageDetail::Extract {
            query,
            query_origin,
            ..
        } => (query.clone(), *query_origin),
        other => panic!("expected extract, got {other:?}"),
    };
    assert_eq!(
        query("acme/extract/inline"),
        ("SELECT 1 AS x".to_string(), BindingOrigin::Pipeline)
    );
    assert_eq!(
        query("acme/extract/custom"),
        ("SELECT * FROM tenant_view".to_string(), BindingOrigin::Tenant)
    );
    assert_eq!(query("acme/extract/lot_history").1, BindingOrigin::Shared);
    assert_eq!(
        query("acme/extract/wip"),
        ("SELECT * FROM mes_wip".to_string(), BindingOrigin::Fallback)
    );
}

#[test]
fn test_missing_target_descriptor_drops_only_load() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  wip:
    source_table: wip
    date_column: DATE(updated_at)
    has_transfer: true
    save_to_target: true
"#;
    let tenant = tenant_from(yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();

    assert_eq!(ids(&graph), vec!["acme/extract/wip", "acme/transfer/wip"]);
    assert_eq!(
        graph.diagnostics,
        vec![GraphViolation {
            pipeline: PipelineName::try_new("wip").unwrap(),
            kind: ViolationKind::MissingTargetDescriptor,
        }]
    );

    let strict = GraphBuilder::default().strict(true).build(&tenant, "prod");
    match strict {
        Err(CoreError::PipelineConfig { tenant, violations }) => {
            assert_eq!(tenant, "acme");
            assert_eq!(violations.len(), 1);
        }
        other => panic!("expected PipelineConfig error, got {other:?}"),
    }
}

#[test]
fn test_tenant_load_config_counts_as_descriptor() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  wip:
    source_table: wip
    save_to_target: true
"#;
    let tenant = tenant_from(yaml);
    let binding = CustomCodeBinding::default().with_load_config(
        "wip",
        LoadConfig::new("wip_snapshot", "aps", ["tenant_id", "lot_id"]),
    );
    let source = StaticBindingSource::new().with_binding(tenant.id.clone(), binding);
    let builder = GraphBuilder::new(Arc::new(source), Arc::new(TransformCatalog::with_defaults()));
    let graph = builder.build(&tenant, "prod").unwrap();

    let load = graph.node("acme/load/wip").unwrap();
    assert_eq!(load.upstream[0].as_str(), "acme/extract/wip");
    assert!(matches!(
        load.detail,
        StageDetail::Load {
            target_origin: BindingOrigin::Tenant,
            ..
        }
    ));
}

#[test]
fn test_transfer_inputs_and_violations() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  lot_history:
    source_table: lot_history
    date_column: DATE(created_at)
  process_result:
    source_table: process_result
    date_column: DATE(measured_at)
  item_master:
    source_table: item_master
  cycle_time:
    source_table: cycle_time
    date_column: DATE(created_at)
    has_transfer: true
    transfer_inputs: [lot_history, process_result]
  mixed:
    source_table: mixed
    date_column: DATE(created_at)
    has_transfer: true
    transfer_inputs: [lot_history, item_master]
    save_to_target: true
    target:
      table: mixed
      key_columns: [tenant_id]
  dangling:
    source_table: dangling
    has_transfer: true
    transfer_inputs: [nowhere]
"#;
    let tenant = tenant_from(yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();

    let transfer = graph.node("acme/transfer/cycle_time").unwrap();
    let upstream: Vec<&str> = transfer.upstream.iter().map(StageId::as_str).collect();
    assert_eq!(
        upstream,
        vec!["acme/extract/lot_history", "acme/extract/process_result"]
    );

    assert!(graph.node("acme/transfer/mixed").is_none());
    assert!(graph.node("acme/load/mixed").is_none());
    assert!(graph.node("acme/extract/mixed").is_some());
    assert!(graph.node("acme/transfer/dangling").is_none());

    let kinds: Vec<&ViolationKind> = graph.diagnostics.iter().map(|d| &d.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds
        .iter()
        .any(|k| matches!(k, ViolationKind::UnknownTransferInput { input } if input == "nowhere")));
    assert!(kinds.iter().any(|k| matches!(
        k,
        ViolationKind::MixedPartitioning {
            found: Partitioning::Unpartitioned,
            ..
        }
    )));
}

#[test]
fn test_omitted_target_database_uses_defaults() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
"#;
    let tenant = tenant_from(yaml);
    let graph = GraphBuilder::default().build(&tenant, "dev").unwrap();

    // Default pipeline set with the shared descriptors
    assert!(graph.node("acme/extract/lot_history").is_some());
    assert!(graph.node("acme/transfer/lot_history").is_some());
    let load = graph.node("acme/load/lot_history").unwrap();
    match &load.detail {
        StageDetail::Load {
            target,
            tenant_column,
            ..
        } => {
            assert_eq!(target.catalog, None);
            assert_eq!(target.schema, "aps");
            assert_eq!(tenant_column, "tenant_id");
        }
        other => panic!("expected load detail, got {other:?}"),
    }
    assert!(graph.diagnostics.is_empty());
}

#[test]
fn test_env_override_drops_load() {
    let yaml = format!(
        "{ACME}{}",
        r#"    env_overrides:
      dev:
        save_to_target: false
"#
    );
    let tenant = tenant_from(&yaml);
    let dev = GraphBuilder::default().build(&tenant, "dev").unwrap();
    assert_eq!(dev.nodes.len(), 2);
    let prod = GraphBuilder::default().build(&tenant, "prod").unwrap();
    assert_eq!(prod.nodes.len(), 3);
}

#[test]
fn test_job_emission_rules() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
tags:
  team: mes
pipelines:
  lot_history:
    source_table: lot_history
    date_column: DATE(created_at)
    has_transfer: true
  equipment_event:
    source_table: equipment_event
    date_column: DATE(event_time)
jobs:
  reference_sync:
    enabled: true
  extract_only:
    enabled: true
  load_only:
    enabled: true
  pipelines:
    wip:
      pipelines: [lot_history]
      schedule:
        cron: "0 3 * * *"
        auto_start: true
    disabled_job:
      enabled: false
      pipelines: [lot_history]
"#;
    let tenant = tenant_from(yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();

    let names: Vec<&str> = graph.jobs.iter().map(|j| j.name.as_str()).collect();
    // No unpartitioned and no load nodes: those jobs are not emitted
    assert_eq!(
        names,
        vec!["acme_daily_etl_job", "acme_extract_only_job", "acme_wip_pipeline_job"]
    );

    let daily = graph.job("acme_daily_etl_job").unwrap();
    assert_eq!(daily.stages.len(), 3);
    assert_eq!(daily.tags.get("tenant_id").map(String::as_str), Some("acme"));
    assert_eq!(daily.tags.get("team").map(String::as_str), Some("mes"));

    let wip = graph.job("acme_wip_pipeline_job").unwrap();
    let stages: Vec<&str> = wip.stages.iter().map(StageId::as_str).collect();
    assert_eq!(
        stages,
        vec!["acme/extract/lot_history", "acme/transfer/lot_history"]
    );

    let extract_only = graph.job("acme_extract_only_job").unwrap();
    assert_eq!(extract_only.stages.len(), 2);

    assert_eq!(graph.schedules.len(), 1);
    let schedule = &graph.schedules[0];
    assert_eq!(schedule.name, "acme_wip_pipeline_schedule");
    assert_eq!(schedule.job, "acme_wip_pipeline_job");
    assert_eq!(schedule.timezone, "Asia/Seoul");
    assert_eq!(schedule.default_status, ScheduleStatus::Running);
}

#[test]
fn test_daily_schedule_defaults_to_stopped() {
    let yaml = format!(
        "{ACME}{}",
        r#"jobs:
  daily_etl:
    schedule:
      cron: "30 1 * * *"
"#
    );
    let tenant = tenant_from(&yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();
    let schedule = &graph.schedules[0];
    assert_eq!(schedule.name, "acme_daily_etl_schedule");
    assert_eq!(schedule.cron, "30 1 * * *");
    assert_eq!(schedule.default_status, ScheduleStatus::Stopped);
}

#[test]
fn test_unknown_job_pipeline_is_diagnosed() {
    let yaml = format!(
        "{ACME}{}",
        r#"jobs:
  pipelines:
    ghost:
      pipelines: [missing]
"#
    );
    let tenant = tenant_from(&yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();
    assert!(graph.job("acme_ghost_pipeline_job").is_none());
    assert_eq!(graph.diagnostics.len(), 1);
    assert!(GraphBuilder::default()
        .strict(true)
        .build(&tenant, "prod")
        .is_err());
}

#[test]
fn test_build_is_deterministic() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
"#;
    let tenant = tenant_from(yaml);
    let builder = GraphBuilder::default();
    let first = builder.build(&tenant, "prod").unwrap();
    let second = builder.build(&tenant, "prod").unwrap();

    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);
    assert_eq!(first.jobs, second.jobs);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_topological_nodes() {
    let tenant = tenant_from(ACME);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();
    let order: Vec<StageKind> = graph
        .topological_nodes()
        .unwrap()
        .iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        order,
        vec![StageKind::Extract, StageKind::Transfer, StageKind::Load]
    );
}

#[test]
fn test_resolver_for_other_tenant_rejected() {
    let tenant = tenant_from(ACME);
    let mut other = tenant.clone();
    other.id = TenantId::try_new("globex").unwrap();

    let builder = GraphBuilder::default();
    let resolver = builder.resolver_for(&other);
    assert!(builder
        .build_with_resolver(&tenant, "prod", &resolver)
        .is_err());
}

#[test]
fn test_stage_only_jobs_select_daily_nodes() {
    let yaml = r#"
id: acme
name: Acme
source_database:
  database: acme_mes
pipelines:
  lot_history:
    source_table: lot_history
    date_column: DATE(created_at)
  item_master:
    source_table: item_master
jobs:
  extract_only:
    enabled: true
"#;
    let tenant = tenant_from(yaml);
    let graph = GraphBuilder::default().build(&tenant, "prod").unwrap();

    let extract_only = graph.job("acme_extract_only_job").unwrap();
    let stages: Vec<&str> = extract_only.stages.iter().map(StageId::as_str).collect();
    assert_eq!(stages, vec!["acme/extract/lot_history"]);

    let reference = graph.job("acme_reference_sync_job").unwrap();
    let stages: Vec<&str> = reference.stages.iter().map(StageId::as_str).collect();
    assert_eq!(stages, vec!["acme/extract/item_master"]);
}
