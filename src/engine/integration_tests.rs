// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Whole-pipeline scenarios: real units, real inboxes, real trace stores.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::config::{PipelineConfig, TraceConfig};
use crate::engine::{Pipeline, ProcessorContext};
use crate::errors::{FreezeError, PipelineError, PortContractError, ProcessorError, TraceError, WiringError};
use crate::processors::{FieldMapper, RecordCollector, StaticSource};
use crate::record::{Record, SerialAllocator};
use crate::trace::{ComponentState, TraceDb};
use crate::traits::{InputClosure, InputHandlers, PortSpec, Processor};

/// Emits `{id: n}` for each configured id, optionally failing after a number
/// of records or leaving its output open.
struct Source {
    ids: Vec<i64>,
    fail_after: Option<usize>,
    close: bool,
}

impl Source {
    fn ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            fail_after: None,
            close: true,
        }
    }
}

impl Processor for Source {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out", "row")]
    }

    fn extract(&mut self, ctx: &mut ProcessorContext) -> Result<(), ProcessorError> {
        for (n, id) in self.ids.iter().enumerate() {
            if self.fail_after == Some(n) {
                return Err(ProcessorError::failed(format!("source gave up after {} records", n)));
            }
            let mut record = ctx.new_record("row");
            record.set("id", *id)?;
            ctx.dispatch_output("out", record)?;
        }
        if self.close {
            ctx.output_finished("out")?;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Observed {
    ids: Arc<Mutex<Vec<i64>>>,
    closures: Arc<Mutex<Vec<(String, InputClosure)>>>,
}

impl Observed {
    fn ids(&self) -> Vec<i64> {
        self.ids.lock().unwrap().clone()
    }

    fn closures(&self) -> Vec<(String, InputClosure)> {
        self.closures.lock().unwrap().clone()
    }
}

/// Holds every record on `in`; on close unholds them and records their ids.
struct Sink {
    observed: Observed,
    optional: Vec<&'static str>,
    panic_on: Option<i64>,
}

impl Sink {
    fn new(observed: &Observed) -> Self {
        Self {
            observed: observed.clone(),
            optional: Vec::new(),
            panic_on: None,
        }
    }

    fn on_record(&mut self, ctx: &mut ProcessorContext, _port: &str, record: Record) -> Result<(), ProcessorError> {
        let id = record.get("id")?.as_i64().unwrap_or_default();
        if self.panic_on == Some(id) {
            panic!("sink cannot digest record {}", id);
        }
        ctx.hold_record(record);
        Ok(())
    }
}

impl Processor for Sink {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        let mut ports = vec![PortSpec::new("in", "row")];
        ports.extend(self.optional.iter().map(|p| PortSpec::new(*p, "row").optional()));
        ports
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn register_input_handlers(&self, handlers: &mut InputHandlers<Self>) {
        handlers.on_any(Self::on_record);
    }

    fn handle_input_closed(
        &mut self,
        ctx: &mut ProcessorContext,
        port: &str,
        closure: InputClosure,
    ) -> Result<(), ProcessorError> {
        let held = ctx.unhold_records();
        let mut ids = self.observed.ids.lock().unwrap();
        for record in held {
            ids.push(record.get("id")?.as_i64().unwrap_or_default());
        }
        self.observed.closures.lock().unwrap().push((port.to_string(), closure));
        Ok(())
    }
}

/// Forwards the first `limit` records, then closes its output early.
struct Take {
    limit: usize,
    seen: usize,
}

impl Take {
    fn on_record(&mut self, ctx: &mut ProcessorContext, _port: &str, record: Record) -> Result<(), ProcessorError> {
        self.seen += 1;
        ctx.dispatch_output("out", record)?;
        if self.seen == self.limit {
            ctx.output_finished("out")?;
        }
        Ok(())
    }
}

impl Processor for Take {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in", "row")]
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out", "row")]
    }

    fn register_input_handlers(&self, handlers: &mut InputHandlers<Self>) {
        handlers.on("in", Self::on_record);
    }
}

fn traced(dir: &tempfile::TempDir) -> (PipelineConfig, std::path::PathBuf) {
    let path = dir.path().join("run.trace");
    let config = PipelineConfig {
        trace: Some(TraceConfig::new(&path)),
        ..PipelineConfig::default()
    };
    (config, path)
}

#[tokio::test]
async fn test_source_to_sink_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (config, trace_path) = traced(&dir);
    let observed = Observed::default();

    let mut pipeline = Pipeline::from_config(config).unwrap();
    let source = pipeline.add("source", Source::ids([1, 2, 3])).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(observed.ids(), vec![1, 2, 3]);
    assert_eq!(observed.closures(), vec![("in".to_string(), InputClosure::Clean)]);

    let summary = report.tracer.unwrap();
    assert_eq!(summary.failed, 0);

    let db = TraceDb::open_read_only(&trace_path).unwrap();
    assert_eq!(db.etl_state().unwrap(), ComponentState::Finished);

    let components: Vec<_> = db.list_components().unwrap().collect();
    assert_eq!(components.len(), 2);
    for component in &components {
        assert_eq!(component.state, ComponentState::Finished);
        assert!(component.ended_at.is_some());
    }
    assert_eq!(components[0].name, "source");
    assert_eq!(components[0].class_name, "Source");

    let connections: Vec<_> = db.list_connections().unwrap().collect();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].source_port, "out");
    assert_eq!(connections[0].dest_port, "in");

    let stats: Vec<_> = db.get_connection_stats().unwrap().collect();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].envelope_count, 3);
    assert_eq!(db.list_records().unwrap().len(), 3);
}

#[tokio::test]
async fn test_back_pressure_preserves_order_with_capacity_one() {
    let observed = Observed::default();
    let config = PipelineConfig {
        queue_capacity: 1,
        ..PipelineConfig::default()
    };

    let mut pipeline = Pipeline::from_config(config).unwrap();
    let source = pipeline.add("source", Source::ids(0..500)).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    pipeline.run().await.unwrap();
    assert_eq!(observed.ids(), (0..500).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_fan_out_delivers_every_record_to_every_input() {
    let left = Observed::default();
    let right = Observed::default();

    let mut pipeline = Pipeline::new();
    let source = pipeline.add("source", Source::ids([10, 20])).unwrap();
    let a = pipeline.add("left", Sink::new(&left)).unwrap();
    let b = pipeline.add("right", Sink::new(&right)).unwrap();
    pipeline.connect(source, "out", a, "in").unwrap();
    pipeline.connect(source, "out", b, "in").unwrap();

    pipeline.run().await.unwrap();
    assert_eq!(left.ids(), vec![10, 20]);
    assert_eq!(right.ids(), vec![10, 20]);
}

#[tokio::test]
async fn test_fan_in_closes_port_once_after_every_upstream() {
    let observed = Observed::default();

    let mut pipeline = Pipeline::new();
    let first = pipeline.add("first", Source::ids([1, 2])).unwrap();
    let second = pipeline.add("second", Source::ids([3, 4, 5])).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(first, "out", sink, "in").unwrap();
    pipeline.connect(second, "out", sink, "in").unwrap();

    pipeline.run().await.unwrap();

    let mut ids = observed.ids();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(observed.closures().len(), 1);
}

#[tokio::test]
async fn test_failure_closes_downstream_aborted_and_is_traced() {
    let dir = tempfile::tempdir().unwrap();
    let (config, trace_path) = traced(&dir);
    let observed = Observed::default();

    let mut pipeline = Pipeline::from_config(config).unwrap();
    let mut failing = Source::ids([1, 2, 3, 4]);
    failing.fail_after = Some(2);
    let source = pipeline.add("source", failing).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "pipeline run failed: processor 'source' (component#1) failed: source gave up after 2 records"
    );

    let report = err.report().unwrap();
    assert_eq!(report.state, ComponentState::Error);
    assert_eq!(report.component("source").unwrap().state, ComponentState::Error);
    // a failing sibling does not take the sink down
    assert_eq!(report.component("sink").unwrap().state, ComponentState::Finished);

    assert_eq!(observed.ids(), vec![1, 2]);
    assert_eq!(observed.closures(), vec![("in".to_string(), InputClosure::Aborted)]);

    let db = TraceDb::open_read_only(&trace_path).unwrap();
    assert_eq!(db.etl_state().unwrap(), ComponentState::Error);
    let source_row = db.get_component(source).unwrap();
    assert_eq!(source_row.state, ComponentState::Error);
    assert!(source_row.ended_at.is_some());
}

#[tokio::test]
async fn test_stock_mapper_passes_upstream_abort_downstream() {
    let mut failing = Source::ids([1, 2, 3]);
    failing.fail_after = Some(1);
    let (collector, collected) = RecordCollector::new("row");

    let mut pipeline = Pipeline::new();
    let source = pipeline.add("source", failing).unwrap();
    let mapper = pipeline.add("mapper", FieldMapper::set_field("row", "seen", true)).unwrap();
    let collector = pipeline.add("collector", collector).unwrap();
    pipeline.connect(source, "out", mapper, "in").unwrap();
    pipeline.connect(mapper, "out", collector, "in").unwrap();

    let err = pipeline.run().await.unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.component("mapper").unwrap().state, ComponentState::Finished);
    assert_eq!(report.failures().count(), 1);

    assert_eq!(collected.len(), 1);
    assert_eq!(collected.closure(), Some(InputClosure::Aborted));
}

#[tokio::test]
async fn test_panicking_handler_fails_only_its_processor() {
    let observed = Observed::default();
    let mut sink = Sink::new(&observed);
    sink.panic_on = Some(2);

    let mut pipeline = Pipeline::new();
    let source = pipeline.add("source", Source::ids(1..=50)).unwrap();
    let sink = pipeline.add("sink", sink).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    let err = pipeline.run().await.unwrap_err();
    let report = err.report().unwrap();
    // the source's deliveries after the sink died are dropped, not errors
    assert_eq!(report.component("source").unwrap().state, ComponentState::Finished);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].component_name, "sink");
    assert!(matches!(&failures[0].source, ProcessorError::Panicked(msg) if msg.contains("record 2")));
}

#[tokio::test]
async fn test_output_left_open_is_a_contract_failure() {
    let observed = Observed::default();
    let mut lazy = Source::ids([1]);
    lazy.close = false;

    let mut pipeline = Pipeline::new();
    let source = pipeline.add("source", lazy).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    let err = pipeline.run().await.unwrap_err();
    let failure = err.report().unwrap().failures().next().unwrap();
    assert!(matches!(
        &failure.source,
        ProcessorError::Port(PortContractError::OutputsLeftOpen { ports, .. }) if ports == &vec!["out".to_string()]
    ));
    // the record sent before the failure still arrives, then an aborted close
    assert_eq!(observed.ids(), vec![1]);
    assert_eq!(observed.closures()[0].1, InputClosure::Aborted);
}

#[tokio::test]
async fn test_processor_finishes_when_outputs_close_early() {
    let observed = Observed::default();

    let mut pipeline = Pipeline::from_config(PipelineConfig {
        queue_capacity: 2,
        ..PipelineConfig::default()
    })
    .unwrap();
    let source = pipeline.add("source", Source::ids(1..=100)).unwrap();
    let take = pipeline.add("take", Take { limit: 3, seen: 0 }).unwrap();
    let sink = pipeline.add("sink", Sink::new(&observed)).unwrap();
    pipeline.connect(source, "out", take, "in").unwrap();
    pipeline.connect(take, "out", sink, "in").unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.components.iter().all(|c| c.state == ComponentState::Finished));
    assert_eq!(observed.ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unconnected_optional_input_is_closed_once() {
    let observed = Observed::default();
    let mut sink = Sink::new(&observed);
    sink.optional = vec!["extra"];

    let mut pipeline = Pipeline::new();
    let source = pipeline.add("source", Source::ids([7])).unwrap();
    let sink = pipeline.add("sink", sink).unwrap();
    pipeline.connect(source, "out", sink, "in").unwrap();

    pipeline.run().await.unwrap();
    let mut closures = observed.closures();
    closures.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        closures,
        vec![
            ("extra".to_string(), InputClosure::Clean),
            ("in".to_string(), InputClosure::Clean),
        ]
    );
}

#[tokio::test]
async fn test_required_input_must_be_connected() {
    let observed = Observed::default();
    let mut pipeline = Pipeline::new();
    pipeline.add("sink", Sink::new(&observed)).unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Wiring(WiringError::RequiredInputUnconnected { .. })
    ));
}

#[tokio::test]
async fn test_existing_trace_store_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let (config, trace_path) = traced(&dir);
    std::fs::write(&trace_path, b"keep me").unwrap();

    let mut pipeline = Pipeline::from_config(config).unwrap();
    pipeline.add("source", Source::ids([])).unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Trace(TraceError::AlreadyExists { .. })));
    assert_eq!(std::fs::read(&trace_path).unwrap(), b"keep me");
}

#[tokio::test]
async fn test_stock_processors_with_injected_serials_and_freezer() {
    let dir = tempfile::tempdir().unwrap();
    let (config, trace_path) = traced(&dir);

    let trim = |value: Value| -> Result<Value, FreezeError> {
        Ok(match value {
            Value::String(text) => Value::String(text.trim().to_string()),
            other => other,
        })
    };

    let mut pipeline = Pipeline::from_config(config)
        .unwrap()
        .with_serials(Arc::new(SerialAllocator::starting_at(100)))
        .with_freezer(Arc::new(trim));

    let source = StaticSource::new("person")
        .with_row([("name", json!("  ada "))])
        .with_row([("name", json!("grace"))]);
    let (collector, collected) = RecordCollector::new("person");

    let source = pipeline.add("source", source).unwrap();
    let mapper = pipeline.add("mapper", FieldMapper::uppercase("person", "name")).unwrap();
    let collector = pipeline.add("collector", collector).unwrap();
    pipeline.connect(source, "out", mapper, "in").unwrap();
    pipeline.connect(mapper, "out", collector, "in").unwrap();

    pipeline.run().await.unwrap();

    let records = collected.records();
    let names: Vec<_> = records.iter().map(|r| r.get("name").unwrap().clone()).collect();
    assert_eq!(names, vec![json!("ADA"), json!("GRACE")]);
    assert!(records.iter().all(|r| r.origin_component_name() == Some("mapper")));
    assert_eq!(collected.closure(), Some(InputClosure::Clean));

    let db = TraceDb::open_read_only(&trace_path).unwrap();
    let serials: Vec<u64> = db.list_records().unwrap().map(|r| r.serial.0).collect();
    assert_eq!(serials, vec![100, 101, 102, 103]);
}

#[tokio::test]
async fn test_work_dirs_are_created_per_processor() {
    struct Writer;

    impl Processor for Writer {
        fn list_input_ports(&self) -> Vec<PortSpec> {
            Vec::new()
        }

        fn list_output_ports(&self) -> Vec<PortSpec> {
            Vec::new()
        }

        fn extract(&mut self, ctx: &mut ProcessorContext) -> Result<(), ProcessorError> {
            let data = ctx
                .data_dir()
                .ok_or_else(|| ProcessorError::failed("no data dir"))?;
            std::fs::write(data.join("out.txt"), ctx.name())?;
            Ok(())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        work_dir: Some(dir.path().to_path_buf()),
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::from_config(config).unwrap();
    pipeline.add("writer", Writer).unwrap();
    pipeline.run().await.unwrap();

    let written = std::fs::read_to_string(dir.path().join("writer/data/out.txt")).unwrap();
    assert_eq!(written, "writer");
    assert!(dir.path().join("writer/tmp").is_dir());
}
