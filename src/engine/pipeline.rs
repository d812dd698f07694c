// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline assembly and the run itself.
//!
//! Processors are added one at a time and receive sequential ids. Their
//! ports are read once, at `add`, and connections are checked against them
//! as they are made. [`Pipeline::run`] then:
//!
//! 1. checks every required input is connected
//! 2. prepares working directories and starts the tracer
//! 3. traces components, ports and connections before anything runs
//! 4. starts one blocking unit per processor, wired by bounded inboxes
//! 5. waits for every unit to reach a terminal state
//!
//! A failing processor never stops its siblings; they drain naturally and
//! the run reports the failure once everything is terminal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::config::consts::{DATA_DIR_NAME, DEFAULT_COMMIT_EVERY, TMP_DIR_NAME};
use crate::config::{validate_config, Endpoint, PipelineConfig};
use crate::engine::context::{ContextParts, ProcessorContext, Route};
use crate::engine::driver::{DynUnit, Unit, UnitWiring};
use crate::engine::report::{ComponentOutcome, RunReport};
use crate::errors::{
    ConfigError, PipelineError, PortContractError, ProcessorError, ProcessorFailure, WiringError,
};
use crate::ids::{ComponentId, ConnectionId};
use crate::observability::messages::engine::{PipelineCompleted, PipelineFailed, PipelineStarted};
use crate::observability::messages::processor::ProcessorRegistered;
use crate::observability::messages::StructuredLog;
use crate::record::{Freezer, PassthroughFreezer, SerialAllocator};
use crate::trace::{ComponentState, TraceDb, TraceEvent, TraceHandle, Tracer};
use crate::traits::{InputHandlers, PortDirection, PortSpec, Processor};

struct Registered {
    id: ComponentId,
    name: String,
    class_name: &'static str,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    unit: Box<dyn DynUnit>,
}

#[derive(Debug, Clone)]
struct Connection {
    id: ConnectionId,
    source: ComponentId,
    source_port: String,
    dest: ComponentId,
    dest_port: String,
}

pub struct Pipeline {
    config: PipelineConfig,
    components: Vec<Registered>,
    connections: Vec<Connection>,
    serials: Arc<SerialAllocator>,
    freezer: Arc<dyn Freezer>,
    trace_db: Option<Arc<TraceDb>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Untraced pipeline with default options.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            components: Vec::new(),
            connections: Vec::new(),
            serials: Arc::new(SerialAllocator::new()),
            freezer: Arc::new(PassthroughFreezer),
            trace_db: None,
        }
    }

    /// Pipeline using `config` for its options. Named connections in the
    /// config are applied later, by [`apply_connections`](Self::apply_connections).
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        validate_config(&config).map_err(ConfigError::Invalid)?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Share a serial allocator, e.g. one starting at a known value.
    pub fn with_serials(mut self, serials: Arc<SerialAllocator>) -> Self {
        self.serials = serials;
        self
    }

    pub fn with_freezer(mut self, freezer: Arc<dyn Freezer>) -> Self {
        self.freezer = freezer;
        self
    }

    /// Trace into an already open read-write store instead of creating one
    /// from the config.
    pub fn with_trace_db(mut self, db: Arc<TraceDb>) -> Self {
        self.trace_db = Some(db);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn processor_count(&self) -> usize {
        self.components.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.components.iter().find(|c| c.name == name).map(|c| c.id)
    }

    /// Register a processor under a unique name.
    ///
    /// Its ports and input handler table are read and checked here; a
    /// duplicate port name or an input port with no handler is rejected.
    pub fn add<P: Processor>(&mut self, name: impl Into<String>, processor: P) -> Result<ComponentId, PipelineError> {
        let name = name.into();
        if self.component_id(&name).is_some() {
            return Err(WiringError::DuplicateComponentName { name }.into());
        }

        let inputs = processor.list_input_ports();
        let outputs = processor.list_output_ports();
        check_unique_ports(&name, &inputs, PortDirection::Input)?;
        check_unique_ports(&name, &outputs, PortDirection::Output)?;

        let mut handlers = InputHandlers::new();
        processor.register_input_handlers(&mut handlers);
        handlers.check_covers(&name, &inputs)?;

        let id = ComponentId(self.components.len() as u64 + 1);
        let class_name = processor.class_name();

        ProcessorRegistered {
            component_id: id,
            component_name: &name,
            class_name,
            inputs: inputs.len(),
            outputs: outputs.len(),
        }
        .log();

        self.components.push(Registered {
            id,
            name,
            class_name,
            inputs,
            outputs,
            unit: Box::new(Unit {
                processor,
                handlers,
                class_name,
            }),
        });
        Ok(id)
    }

    /// Connect an output port to an input port.
    pub fn connect(
        &mut self,
        source: ComponentId,
        source_port: &str,
        dest: ComponentId,
        dest_port: &str,
    ) -> Result<ConnectionId, WiringError> {
        let src = self.registered(source)?;
        if !src.outputs.iter().any(|p| p.name == source_port) {
            return Err(WiringError::UndeclaredPort {
                component: src.name.clone(),
                port: source_port.to_string(),
                direction: PortDirection::Output,
            });
        }
        let dst = self.registered(dest)?;
        if !dst.inputs.iter().any(|p| p.name == dest_port) {
            return Err(WiringError::UndeclaredPort {
                component: dst.name.clone(),
                port: dest_port.to_string(),
                direction: PortDirection::Input,
            });
        }

        let duplicate = self.connections.iter().any(|c| {
            c.source == source && c.source_port == source_port && c.dest == dest && c.dest_port == dest_port
        });
        if duplicate {
            return Err(WiringError::DuplicateConnection {
                from: format!("{}.{}", src.name, source_port),
                to: format!("{}.{}", dst.name, dest_port),
            });
        }

        let id = ConnectionId(self.connections.len() as u64 + 1);
        self.connections.push(Connection {
            id,
            source,
            source_port: source_port.to_string(),
            dest,
            dest_port: dest_port.to_string(),
        });
        Ok(id)
    }

    /// Connect `component.port` to `component.port` by name.
    pub fn connect_named(&mut self, from: &str, to: &str) -> Result<ConnectionId, PipelineError> {
        let from = Endpoint::parse(from)?;
        let to = Endpoint::parse(to)?;
        let source = self.id_by_name(&from.component)?;
        let dest = self.id_by_name(&to.component)?;
        Ok(self.connect(source, &from.port, dest, &to.port)?)
    }

    /// Apply the connections listed in the config. Call once every processor
    /// they name has been added; each listed connection is applied once.
    pub fn apply_connections(&mut self) -> Result<(), PipelineError> {
        for connection in std::mem::take(&mut self.config.connections) {
            self.connect_named(&connection.from, &connection.to)?;
        }
        Ok(())
    }

    /// Drive every processor to a terminal state.
    ///
    /// Returns the report when every processor finished, and
    /// [`PipelineError::RunFailed`] carrying the same report when any ended in
    /// error. Wiring, working directory and trace store problems are returned
    /// before any processor starts.
    pub async fn run(self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();

        self.check_required_inputs()?;
        let work_dirs = self.prepare_work_dirs()?;
        let tracer = self.start_tracer()?;
        let trace = tracer.as_ref().map(Tracer::handle).unwrap_or_default();

        self.trace_wiring(&trace);
        trace.submit(TraceEvent::RunStateChange {
            state: ComponentState::Running,
        });

        let processor_count = self.components.len();
        PipelineStarted {
            processor_count,
            connection_count: self.connections.len(),
            queue_capacity: self.config.queue_capacity,
        }
        .log();

        let Pipeline {
            config,
            components,
            connections,
            serials,
            freezer,
            ..
        } = self;

        let (senders, inboxes): (Vec<_>, Vec<_>) = components
            .iter()
            .map(|_| mpsc::channel(config.queue_capacity))
            .unzip();
        let run_failed = Arc::new(AtomicBool::new(false));

        let mut units = Vec::with_capacity(processor_count);
        for ((component, inbox), dirs) in components.into_iter().zip(inboxes).zip(work_dirs) {
            let Registered {
                id,
                name,
                class_name,
                inputs,
                outputs,
                unit,
            } = component;

            let outputs = outputs
                .into_iter()
                .map(|port| {
                    let routes = connections
                        .iter()
                        .filter(|c| c.source == id && c.source_port == port.name)
                        .filter_map(|c| {
                            let sender = senders.get(slot(c.dest)?)?.clone();
                            Some(Route {
                                connection_id: c.id,
                                dest_port: c.dest_port.clone(),
                                sender,
                            })
                        })
                        .collect();
                    (port.name, routes)
                })
                .collect();

            let mut upstream: HashMap<String, usize> = HashMap::new();
            for c in connections.iter().filter(|c| c.dest == id) {
                *upstream.entry(c.dest_port.clone()).or_insert(0) += 1;
            }
            let unconnected = inputs
                .into_iter()
                .map(|port| port.name)
                .filter(|port| !upstream.contains_key(port))
                .collect();

            let ctx = ProcessorContext::new(ContextParts {
                component_id: id,
                name: name.clone(),
                outputs,
                serials: Arc::clone(&serials),
                freezer: Arc::clone(&freezer),
                trace: trace.clone(),
                work_dirs: dirs,
                run_failed: Arc::clone(&run_failed),
            });
            let wiring = UnitWiring {
                ctx,
                inbox,
                upstream,
                unconnected,
            };
            let handle = tokio::task::spawn_blocking(move || unit.run(wiring));
            units.push((id, name, class_name, handle));
        }
        // only the units hold senders now, so an inbox closes with its last upstream
        drop(senders);

        let mut outcomes = Vec::with_capacity(processor_count);
        for (id, name, class_name, handle) in units {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    trace.submit(TraceEvent::ComponentStateChange {
                        id,
                        state: ComponentState::Error,
                    });
                    ComponentOutcome {
                        id,
                        name: name.clone(),
                        class_name: class_name.to_string(),
                        state: ComponentState::Error,
                        failure: Some(ProcessorFailure {
                            component_id: id,
                            component_name: name,
                            source: ProcessorError::Panicked(join_error.to_string()),
                        }),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let state = if outcomes.iter().any(|o| o.state == ComponentState::Error) {
            ComponentState::Error
        } else {
            ComponentState::Finished
        };
        trace.submit(TraceEvent::RunStateChange { state });
        drop(trace);

        let tracer = match tracer {
            Some(tracer) => tokio::task::spawn_blocking(move || tracer.shutdown()).await.ok(),
            None => None,
        };

        let report = RunReport {
            state,
            components: outcomes,
            tracer,
            duration: started.elapsed(),
        };

        if report.is_success() {
            PipelineCompleted {
                processor_count,
                duration: report.duration,
            }
            .log();
            Ok(report)
        } else {
            let failed: Vec<&str> = report.failures().map(|f| f.component_name.as_str()).collect();
            PipelineFailed {
                failed: &failed,
                processor_count,
                duration: report.duration,
            }
            .log();
            Err(PipelineError::RunFailed(Box::new(report)))
        }
    }

    fn registered(&self, id: ComponentId) -> Result<&Registered, WiringError> {
        slot(id)
            .and_then(|idx| self.components.get(idx))
            .filter(|c| c.id == id)
            .ok_or_else(|| WiringError::UnknownComponent { name: id.to_string() })
    }

    fn id_by_name(&self, name: &str) -> Result<ComponentId, WiringError> {
        self.component_id(name).ok_or_else(|| WiringError::UnknownComponent {
            name: name.to_string(),
        })
    }

    fn check_required_inputs(&self) -> Result<(), WiringError> {
        for component in &self.components {
            for port in component.inputs.iter().filter(|p| !p.optional) {
                let connected = self
                    .connections
                    .iter()
                    .any(|c| c.dest == component.id && c.dest_port == port.name);
                if !connected {
                    return Err(WiringError::RequiredInputUnconnected {
                        component: component.name.clone(),
                        port: port.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Create `<work_dir>/<name>/{data,tmp}` for every processor.
    fn prepare_work_dirs(&self) -> Result<Vec<Option<(PathBuf, PathBuf)>>, PipelineError> {
        let Some(root) = &self.config.work_dir else {
            return Ok(self.components.iter().map(|_| None).collect());
        };
        self.components
            .iter()
            .map(|component| {
                let base = root.join(&component.name);
                let data = base.join(DATA_DIR_NAME);
                let tmp = base.join(TMP_DIR_NAME);
                for dir in [&data, &tmp] {
                    std::fs::create_dir_all(dir).map_err(|source| PipelineError::WorkDir {
                        path: dir.clone(),
                        source,
                    })?;
                }
                Ok(Some((data, tmp)))
            })
            .collect()
    }

    fn start_tracer(&self) -> Result<Option<Tracer>, PipelineError> {
        let commit_every = self
            .config
            .trace
            .as_ref()
            .map(|t| t.commit_every)
            .unwrap_or(DEFAULT_COMMIT_EVERY);

        let db = match (&self.trace_db, &self.config.trace) {
            (Some(db), _) => Arc::clone(db),
            (None, Some(trace)) => Arc::new(TraceDb::create(&trace.path)?),
            (None, None) => return Ok(None),
        };
        Ok(Some(Tracer::start(db, commit_every)?))
    }

    fn trace_wiring(&self, trace: &TraceHandle) {
        if !trace.is_enabled() {
            return;
        }
        for component in &self.components {
            trace.submit(TraceEvent::NewComponent {
                id: component.id,
                name: component.name.clone(),
                class_name: component.class_name.to_string(),
                state: ComponentState::Init,
            });
            let ports = component
                .inputs
                .iter()
                .map(|p| (p, PortDirection::Input))
                .chain(component.outputs.iter().map(|p| (p, PortDirection::Output)));
            for (port, direction) in ports {
                trace.submit(TraceEvent::NewPort {
                    component_id: component.id,
                    name: port.name.clone(),
                    direction,
                    schema: port.schema.name().to_string(),
                });
            }
        }
        for c in &self.connections {
            trace.submit(TraceEvent::NewConnection {
                id: c.id,
                source_component: c.source,
                source_port: c.source_port.clone(),
                dest_component: c.dest,
                dest_port: c.dest_port.clone(),
            });
        }
    }
}

fn slot(id: ComponentId) -> Option<usize> {
    id.0.checked_sub(1).and_then(|idx| usize::try_from(idx).ok())
}

fn check_unique_ports(component: &str, ports: &[PortSpec], direction: PortDirection) -> Result<(), PortContractError> {
    for (idx, port) in ports.iter().enumerate() {
        if ports[..idx].iter().any(|earlier| earlier.name == port.name) {
            return Err(PortContractError::DuplicatePort {
                component: component.to_string(),
                port: port.name.clone(),
                direction,
            });
        }
    }
    Ok(())
}
