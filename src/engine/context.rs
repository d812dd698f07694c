// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The capabilities a processor hook is handed: dispatching records, the
//! holding buffer, and closing output ports.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::{PortContractError, ProcessorError, RecordError};
use crate::ids::{ComponentId, ConnectionId};
use crate::observability::messages::processor::DeliveryDropped;
use crate::observability::messages::StructuredLog;
use crate::record::{Freezer, Origin, Record, SerialAllocator};
use crate::trace::{TraceEvent, TraceHandle};
use crate::traits::InputClosure;

/// What travels through a processor's inbox.
#[derive(Debug)]
pub(crate) enum Delivery {
    Record { port: String, record: Record },
    Closed { port: String, closure: InputClosure },
}

/// One connection leaving an output port.
#[derive(Debug, Clone)]
pub(crate) struct Route {
    pub connection_id: ConnectionId,
    pub dest_port: String,
    pub sender: mpsc::Sender<Delivery>,
}

#[derive(Debug)]
struct OutputPort {
    name: String,
    routes: Vec<Route>,
    closed: bool,
}

/// Per-processor handle onto the runtime.
///
/// Owned by the processor's unit of execution; nothing in it is shared with
/// other units except the serial allocator, the trace handle and the run
/// failure flag.
pub struct ProcessorContext {
    component_id: ComponentId,
    name: String,
    outputs: Vec<OutputPort>,
    held: VecDeque<Record>,
    serials: Arc<SerialAllocator>,
    freezer: Arc<dyn Freezer>,
    trace: TraceHandle,
    data_dir: Option<PathBuf>,
    tmp_dir: Option<PathBuf>,
    run_failed: Arc<AtomicBool>,
}

/// Everything the runtime wires into a context.
pub(crate) struct ContextParts {
    pub component_id: ComponentId,
    pub name: String,
    pub outputs: Vec<(String, Vec<Route>)>,
    pub serials: Arc<SerialAllocator>,
    pub freezer: Arc<dyn Freezer>,
    pub trace: TraceHandle,
    pub work_dirs: Option<(PathBuf, PathBuf)>,
    pub run_failed: Arc<AtomicBool>,
}

impl ProcessorContext {
    pub(crate) fn new(parts: ContextParts) -> Self {
        let (data_dir, tmp_dir) = match parts.work_dirs {
            Some((data, tmp)) => (Some(data), Some(tmp)),
            None => (None, None),
        };
        Self {
            component_id: parts.component_id,
            name: parts.name,
            outputs: parts
                .outputs
                .into_iter()
                .map(|(name, routes)| OutputPort {
                    name,
                    routes,
                    closed: false,
                })
                .collect(),
            held: VecDeque::new(),
            serials: parts.serials,
            freezer: parts.freezer,
            trace: parts.trace,
            data_dir,
            tmp_dir,
            run_failed: parts.run_failed,
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persistent working directory, when the run has a `work_dir`.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Scratch directory, when the run has a `work_dir`.
    pub fn tmp_dir(&self) -> Option<&Path> {
        self.tmp_dir.as_deref()
    }

    /// True once any processor in the run has failed.
    pub fn run_has_failed(&self) -> bool {
        self.run_failed.load(Ordering::Acquire)
    }

    /// New unfrozen record with a serial from the run's allocator.
    pub fn new_record(&self, record_type: impl Into<String>) -> Record {
        Record::new(&self.serials, record_type)
    }

    /// Unfrozen copy of a frozen record, with a fresh serial.
    pub fn copy_record(&self, record: &Record) -> Result<Record, RecordError> {
        record.copy(&self.serials)
    }

    /// Send `record` out of `port` to every connected input.
    ///
    /// An unfrozen record is stamped with this processor as its origin and
    /// frozen first. Blocks while a destination inbox is full.
    pub fn dispatch_output(&mut self, port: &str, mut record: Record) -> Result<(), ProcessorError> {
        let idx = self.open_output(port)?;

        if !record.is_frozen() {
            record.set_origin(Origin {
                component_id: self.component_id,
                component_name: self.name.clone(),
                port: port.to_string(),
            })?;
            record.freeze(self.freezer.as_ref(), &self.serials)?;
            if let Some(serial) = record.serial() {
                self.trace.submit(TraceEvent::NewRecord {
                    serial,
                    record_type: record.record_type().to_string(),
                });
            }
        }

        let output = &self.outputs[idx];
        let Some((last, rest)) = output.routes.split_last() else {
            return Ok(());
        };
        for route in rest {
            self.deliver(&output.name, route, record.clone());
        }
        self.deliver(&output.name, last, record);
        Ok(())
    }

    fn deliver(&self, port: &str, route: &Route, record: Record) {
        let serial = record.serial();
        let delivery = Delivery::Record {
            port: route.dest_port.clone(),
            record,
        };
        match route.sender.blocking_send(delivery) {
            Ok(()) => {
                if let Some(serial) = serial {
                    self.trace.submit(TraceEvent::NewEnvelope {
                        serial,
                        connection_id: route.connection_id,
                    });
                }
            }
            Err(_) => DeliveryDropped {
                component_name: &self.name,
                port,
                connection_id: route.connection_id,
            }
            .log(),
        }
    }

    /// Append to the holding buffer.
    pub fn hold_record(&mut self, record: Record) {
        self.held.push_back(record);
    }

    /// Take every held record, oldest first, leaving the buffer empty.
    pub fn unhold_records(&mut self) -> Vec<Record> {
        self.held.drain(..).collect()
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Close `port` for good. Downstream inputs see a clean closure once the
    /// records already sent have drained.
    pub fn output_finished(&mut self, port: &str) -> Result<(), PortContractError> {
        self.finish_output(port, InputClosure::Clean)
    }

    /// Close `port` for good, marking it aborted: downstream inputs see an
    /// abnormal closure. For passing an upstream abort along.
    pub fn output_aborted(&mut self, port: &str) -> Result<(), PortContractError> {
        self.finish_output(port, InputClosure::Aborted)
    }

    fn finish_output(&mut self, port: &str, closure: InputClosure) -> Result<(), PortContractError> {
        let idx = self.declared_output(port)?;
        if self.outputs[idx].closed {
            return Err(PortContractError::AlreadyClosed {
                component: self.name.clone(),
                port: port.to_string(),
            });
        }
        self.close_output(idx, closure);
        Ok(())
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    pub fn all_outputs_closed(&self) -> bool {
        self.outputs.iter().all(|o| o.closed)
    }

    pub(crate) fn open_output_names(&self) -> Vec<String> {
        self.outputs
            .iter()
            .filter(|o| !o.closed)
            .map(|o| o.name.clone())
            .collect()
    }

    /// Close every still-open output with the aborted marker.
    pub(crate) fn abort_outputs(&mut self) {
        for idx in 0..self.outputs.len() {
            if !self.outputs[idx].closed {
                self.close_output(idx, InputClosure::Aborted);
            }
        }
    }

    pub(crate) fn mark_run_failed(&self) {
        self.run_failed.store(true, Ordering::Release);
    }

    pub(crate) fn trace(&self) -> &TraceHandle {
        &self.trace
    }

    fn close_output(&mut self, idx: usize, closure: InputClosure) {
        let output = &mut self.outputs[idx];
        output.closed = true;
        // routes are dropped with the port so a finished destination is not
        // kept alive by this sender
        for route in std::mem::take(&mut output.routes) {
            let notice = Delivery::Closed {
                port: route.dest_port,
                closure,
            };
            let _ = route.sender.blocking_send(notice);
        }
    }

    fn declared_output(&self, port: &str) -> Result<usize, PortContractError> {
        self.outputs
            .iter()
            .position(|o| o.name == port)
            .ok_or_else(|| PortContractError::UndeclaredOutput {
                component: self.name.clone(),
                port: port.to_string(),
            })
    }

    fn open_output(&self, port: &str) -> Result<usize, PortContractError> {
        let idx = self.declared_output(port)?;
        if self.outputs[idx].closed {
            return Err(PortContractError::OutputClosed {
                component: self.name.clone(),
                port: port.to_string(),
            });
        }
        Ok(idx)
    }

    /// Context wired to one fresh channel per output, for exercising hooks
    /// without a pipeline.
    #[cfg(test)]
    pub(crate) fn standalone(name: &str, outputs: &[&str]) -> (Self, Vec<mpsc::Receiver<Delivery>>) {
        let mut receivers = Vec::new();
        let mut wired = Vec::new();
        for (n, port) in outputs.iter().enumerate() {
            let (sender, receiver) = mpsc::channel(64);
            receivers.push(receiver);
            wired.push((
                port.to_string(),
                vec![Route {
                    connection_id: ConnectionId(n as u64 + 1),
                    dest_port: "in".to_string(),
                    sender,
                }],
            ));
        }
        let ctx = Self::new(ContextParts {
            component_id: ComponentId(1),
            name: name.to_string(),
            outputs: wired,
            serials: Arc::new(SerialAllocator::new()),
            freezer: Arc::new(crate::record::PassthroughFreezer),
            trace: TraceHandle::disabled(),
            work_dirs: None,
            run_failed: Arc::new(AtomicBool::new(false)),
        });
        (ctx, receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(receiver: &mut mpsc::Receiver<Delivery>) -> Vec<Record> {
        let mut out = Vec::new();
        while let Ok(delivery) = receiver.try_recv() {
            if let Delivery::Record { record, .. } = delivery {
                out.push(record);
            }
        }
        out
    }

    #[test]
    fn test_dispatch_freezes_and_stamps_origin() {
        let (mut ctx, mut receivers) = ProcessorContext::standalone("source", &["out"]);
        let mut rec = ctx.new_record("row");
        rec.set("id", 1).unwrap();
        ctx.dispatch_output("out", rec).unwrap();

        let received = records(&mut receivers[0]);
        assert_eq!(received.len(), 1);
        assert!(received[0].is_frozen());
        assert_eq!(received[0].origin_component_name(), Some("source"));
        assert_eq!(received[0].origin_port(), Some("out"));
        assert_eq!(received[0].get("id").unwrap(), &json!(1));
    }

    #[test]
    fn test_forwarded_frozen_record_keeps_its_origin() {
        let (mut upstream, mut up_rx) = ProcessorContext::standalone("source", &["out"]);
        upstream.dispatch_output("out", upstream.new_record("row")).unwrap();
        let rec = records(&mut up_rx[0]).remove(0);

        let (mut relay, mut relay_rx) = ProcessorContext::standalone("relay", &["out"]);
        relay.dispatch_output("out", rec).unwrap();
        let forwarded = records(&mut relay_rx[0]).remove(0);
        assert_eq!(forwarded.origin_component_name(), Some("source"));
    }

    #[test]
    fn test_dispatch_preserves_order() {
        let (mut ctx, mut receivers) = ProcessorContext::standalone("source", &["out"]);
        for id in ["a", "b", "c"] {
            let mut rec = ctx.new_record("row");
            rec.set("id", id).unwrap();
            ctx.dispatch_output("out", rec).unwrap();
        }
        let ids: Vec<_> = records(&mut receivers[0])
            .iter()
            .map(|r| r.get("id").unwrap().clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_undeclared_port_is_rejected() {
        let (mut ctx, _rx) = ProcessorContext::standalone("source", &["out"]);
        let err = ctx.dispatch_output("nope", ctx.new_record("row")).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Port(PortContractError::UndeclaredOutput { .. })
        ));
        assert!(matches!(
            ctx.output_finished("nope"),
            Err(PortContractError::UndeclaredOutput { .. })
        ));
    }

    #[test]
    fn test_closing_twice_and_dispatch_after_close_fail() {
        let (mut ctx, mut receivers) = ProcessorContext::standalone("source", &["out"]);
        ctx.output_finished("out").unwrap();
        assert!(ctx.all_outputs_closed());

        assert_eq!(
            ctx.output_finished("out").unwrap_err(),
            PortContractError::AlreadyClosed {
                component: "source".to_string(),
                port: "out".to_string(),
            }
        );
        let err = ctx.dispatch_output("out", ctx.new_record("row")).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Port(PortContractError::OutputClosed { .. })
        ));

        match receivers[0].try_recv().unwrap() {
            Delivery::Closed { port, closure } => {
                assert_eq!(port, "in");
                assert_eq!(closure, InputClosure::Clean);
            }
            other => panic!("expected closure notice, got {:?}", other),
        }
    }

    #[test]
    fn test_output_aborted_sends_aborted_notice_once() {
        let (mut ctx, mut receivers) = ProcessorContext::standalone("relay", &["out"]);
        ctx.output_aborted("out").unwrap();
        assert!(ctx.all_outputs_closed());
        assert!(matches!(
            ctx.output_finished("out"),
            Err(PortContractError::AlreadyClosed { .. })
        ));

        match receivers[0].try_recv().unwrap() {
            Delivery::Closed { closure, .. } => assert_eq!(closure, InputClosure::Aborted),
            other => panic!("expected closure notice, got {:?}", other),
        }
        assert!(receivers[0].try_recv().is_err());
    }

    #[test]
    fn test_abort_closes_only_open_outputs() {
        let (mut ctx, mut receivers) = ProcessorContext::standalone("splitter", &["left", "right"]);
        ctx.output_finished("left").unwrap();
        ctx.abort_outputs();
        assert!(ctx.all_outputs_closed());
        assert!(ctx.open_output_names().is_empty());

        let closure_of = |rx: &mut mpsc::Receiver<Delivery>| match rx.try_recv().unwrap() {
            Delivery::Closed { closure, .. } => closure,
            other => panic!("expected closure notice, got {:?}", other),
        };
        assert_eq!(closure_of(&mut receivers[0]), InputClosure::Clean);
        assert_eq!(closure_of(&mut receivers[1]), InputClosure::Aborted);
        assert!(receivers[0].try_recv().is_err());
    }

    #[test]
    fn test_hold_then_unhold_returns_fifo_and_empties() {
        let (mut ctx, _rx) = ProcessorContext::standalone("sink", &[]);
        let x = ctx.new_record("x");
        let y = ctx.new_record("y");
        ctx.hold_record(x);
        ctx.hold_record(y);
        assert_eq!(ctx.held_count(), 2);

        let held: Vec<_> = ctx.unhold_records().iter().map(|r| r.record_type().to_string()).collect();
        assert_eq!(held, vec!["x", "y"]);
        assert!(ctx.unhold_records().is_empty());
    }

    #[test]
    fn test_dispatch_to_dropped_destination_is_not_an_error() {
        let (mut ctx, receivers) = ProcessorContext::standalone("source", &["out"]);
        drop(receivers);
        ctx.dispatch_output("out", ctx.new_record("row")).unwrap();
    }
}
