// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::ProcessorContext;
use crate::errors::ProcessorError;
use crate::record::Record;
use crate::traits::{InputClosure, InputHandlers, PortSpec, Processor};

pub const INPUT_PORT: &str = "in";

#[derive(Debug, Default)]
struct Collected {
    records: Vec<Record>,
    closure: Option<InputClosure>,
}

/// Read side of a [`RecordCollector`], kept by whoever built the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CollectedRecords {
    inner: Arc<Mutex<Collected>>,
}

impl CollectedRecords {
    /// Records released so far, in arrival order.
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// How the input closed; `None` while it is still open.
    pub fn closure(&self) -> Option<InputClosure> {
        self.lock().closure
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sink processor: holds every record arriving on `in` and releases the
/// whole set, in order, to its [`CollectedRecords`] when `in` closes.
pub struct RecordCollector {
    schema: String,
    sink: CollectedRecords,
}

impl RecordCollector {
    pub fn new(schema: impl Into<String>) -> (Self, CollectedRecords) {
        let sink = CollectedRecords::default();
        let collector = Self {
            schema: schema.into(),
            sink: sink.clone(),
        };
        (collector, sink)
    }

    fn on_record(&mut self, ctx: &mut ProcessorContext, _port: &str, record: Record) -> Result<(), ProcessorError> {
        ctx.hold_record(record);
        Ok(())
    }
}

impl Processor for RecordCollector {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_PORT, self.schema.clone())]
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn register_input_handlers(&self, handlers: &mut InputHandlers<Self>) {
        handlers.on(INPUT_PORT, Self::on_record);
    }

    fn handle_input_closed(
        &mut self,
        ctx: &mut ProcessorContext,
        _port: &str,
        closure: InputClosure,
    ) -> Result<(), ProcessorError> {
        let mut collected = self.sink.lock();
        collected.records.extend(ctx.unhold_records());
        collected.closure = Some(closure);
        Ok(())
    }
}
