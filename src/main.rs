// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use the_conduit::config::{load_and_validate_config, ConnectionConfig, PipelineConfig, TraceConfig};
use the_conduit::engine::Pipeline;
use the_conduit::errors::PipelineError;
use the_conduit::processors::{CollectedRecords, FieldMapper, RecordCollector, StaticSource};
use the_conduit::trace::TraceDb;

const DISPLAY_WIDTH: usize = 60;

/// Per-process trace file in the temp dir, so repeated runs never collide.
fn fresh_trace_path() -> PathBuf {
    env::temp_dir().join(format!("conduit-demo-{}.trace", std::process::id()))
}

/// Wiring used when no config file is given: source -> mapper -> collector.
fn builtin_config() -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 8,
        connections: vec![
            ConnectionConfig::new("source.out", "mapper.in"),
            ConnectionConfig::new("mapper.out", "collector.in"),
        ],
        ..PipelineConfig::default()
    }
}

/// The demo always traces. A config without a `trace` section gets a fresh
/// per-process store; a configured path is used as-is and must not exist.
fn with_demo_trace(mut config: PipelineConfig) -> PipelineConfig {
    if config.trace.is_none() {
        config.trace = Some(TraceConfig::new(fresh_trace_path()));
    }
    config
}

/// Register the stock source, mapper and collector and apply the wiring.
fn build_pipeline(config: PipelineConfig) -> Result<(Pipeline, CollectedRecords), PipelineError> {
    let source = StaticSource::from_json(
        "planet",
        vec![
            json!({"name": "mercury", "moons": 0}),
            json!({"name": "earth", "moons": 1}),
            json!({"name": "mars", "moons": 2}),
            json!({"name": "jupiter", "moons": 95}),
        ],
    );
    let (collector, collected) = RecordCollector::new("planet");

    let mut pipeline = Pipeline::from_config(config)?;
    pipeline.add("source", source)?;
    pipeline.add("mapper", FieldMapper::uppercase("planet", "name"))?;
    pipeline.add("collector", collector)?;
    pipeline.apply_connections()?;
    Ok((pipeline, collected))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [pipeline.yaml|pipeline.toml]", args[0]);
        eprintln!("Example: {} configs/demo-pipeline.yaml", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path).with_context(|| format!("loading {}", path))?,
        None => builtin_config(),
    };
    let config = with_demo_trace(config);
    let trace_path: Option<PathBuf> = config.trace.as_ref().map(|t| t.path.clone());

    println!("🚰 The Conduit Demo");
    println!("═══════════════════════════════════");
    println!("Queue capacity: {}", config.queue_capacity);
    println!("Connections:");
    for connection in &config.connections {
        println!("  {} -> {}", connection.from, connection.to);
    }
    println!();

    let (pipeline, collected) = build_pipeline(config)?;
    let report = pipeline.run().await?;

    println!("✅ Run finished in {:.2?}", report.duration);
    for outcome in &report.components {
        println!("  {} ({}) -> {}", outcome.name, outcome.class_name, outcome.state);
    }
    if let Some(summary) = report.tracer {
        println!("  trace actions: {} applied, {} failed", summary.applied, summary.failed);
    }
    println!();

    println!("📦 Collected records ({:?} input):", collected.closure());
    for record in collected.records() {
        println!("{}", record.format_for_display(DISPLAY_WIDTH, true, true));
    }

    if let Some(path) = trace_path {
        let db = TraceDb::open_read_only(&path)?;
        println!();
        println!("🔍 Trace store: {}", path.display());
        println!("  run state: {}", db.etl_state()?);
        for stats in db.get_connection_stats()? {
            println!(
                "  {}: {} envelopes",
                stats.connection_id, stats.envelope_count
            );
        }
    }

    Ok(())
}
