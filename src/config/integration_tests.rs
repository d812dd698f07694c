// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::json;

use crate::config::{load_and_validate_config, PipelineConfig, TraceConfig};
use crate::engine::Pipeline;
use crate::processors::{CollectedRecords, FieldMapper, RecordCollector, StaticSource};
use crate::trace::{ComponentState, TraceDb};

/// Register the three stock processors the demo configs wire together.
fn demo_pipeline(config: PipelineConfig) -> (Pipeline, CollectedRecords) {
    let mut pipeline = Pipeline::from_config(config).unwrap();
    let source = StaticSource::from_json(
        "city",
        vec![json!({"name": "lisbon"}), json!({"name": "oslo"}), json!({"name": "quito"})],
    );
    let (collector, collected) = RecordCollector::new("city");
    pipeline.add("source", source).unwrap();
    pipeline.add("mapper", FieldMapper::uppercase("city", "name")).unwrap();
    pipeline.add("collector", collector).unwrap();
    pipeline.apply_connections().unwrap();
    (pipeline, collected)
}

#[test]
fn test_demo_yaml_loading() {
    let config = load_and_validate_config("configs/demo-pipeline.yaml").unwrap();

    assert_eq!(config.queue_capacity, 16);
    assert!(config.trace.is_none());
    assert_eq!(config.connections.len(), 2);
    assert_eq!(config.connections[0].from, "source.out");
    assert_eq!(config.connections[1].to, "collector.in");
}

#[test]
fn test_demo_toml_matches_yaml_wiring() {
    let yaml = load_and_validate_config("configs/demo-pipeline.yaml").unwrap();
    let toml = load_and_validate_config("configs/demo-pipeline.toml").unwrap();

    assert_eq!(toml.queue_capacity, 4);
    assert!(toml.trace.is_none());
    assert_eq!(toml.connections, yaml.connections);
}

#[tokio::test]
async fn test_toml_config_runs_end_to_end() {
    let config = load_and_validate_config("configs/demo-pipeline.toml").unwrap();
    let (pipeline, collected) = demo_pipeline(config);
    assert_eq!(pipeline.connection_count(), 2);

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());
    assert!(report.tracer.is_none());

    let names: Vec<_> = collected
        .records()
        .iter()
        .map(|r| r.get("name").unwrap().clone())
        .collect();
    assert_eq!(names, vec![json!("LISBON"), json!("OSLO"), json!("QUITO")]);
}

#[tokio::test]
async fn test_yaml_config_runs_traced() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = load_and_validate_config("configs/demo-pipeline.yaml").unwrap();
    let trace_path = dir.path().join("demo.trace");
    config.trace = Some(TraceConfig::new(&trace_path));

    let (pipeline, collected) = demo_pipeline(config);
    pipeline.run().await.unwrap();
    assert_eq!(collected.len(), 3);

    let db = TraceDb::open_read_only(&trace_path).unwrap();
    assert_eq!(db.etl_state().unwrap(), ComponentState::Finished);
    let names: Vec<_> = db.list_components().unwrap().map(|c| c.name).collect();
    assert_eq!(names, vec!["source", "mapper", "collector"]);
    let envelopes: Vec<_> = db
        .get_connection_stats()
        .unwrap()
        .map(|s| s.envelope_count)
        .collect();
    assert_eq!(envelopes, vec![3, 3]);
}
