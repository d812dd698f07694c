// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::engine::ProcessorContext;
use crate::errors::ProcessorError;
use crate::record::Record;
use crate::traits::{InputClosure, InputHandlers, PortSpec, Processor};

pub const INPUT_PORT: &str = "in";
pub const OUTPUT_PORT: &str = "out";

type Mapping = Box<dyn FnMut(&mut Record) -> Result<(), ProcessorError> + Send>;

/// Transform processor: copies every record arriving on `in`, applies a
/// mapping to the copy and dispatches it on `out`. Closes `out` when `in`
/// closes, aborted if `in` closed aborted.
pub struct FieldMapper {
    schema: String,
    mapping: Mapping,
}

impl FieldMapper {
    pub fn new<F>(schema: impl Into<String>, mapping: F) -> Self
    where
        F: FnMut(&mut Record) -> Result<(), ProcessorError> + Send + 'static,
    {
        Self {
            schema: schema.into(),
            mapping: Box::new(mapping),
        }
    }

    /// Set `field` to `value` on every record.
    pub fn set_field(schema: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        Self::new(schema, move |record: &mut Record| {
            record.set(field.clone(), value.clone())?;
            Ok(())
        })
    }

    /// Upper-case a string field. Records without the field, or where it is
    /// not a string, pass through unchanged.
    pub fn uppercase(schema: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(schema, move |record: &mut Record| {
            let upper = match record.get(&field) {
                Ok(Value::String(text)) => text.to_uppercase(),
                _ => return Ok(()),
            };
            record.set(field.clone(), upper)?;
            Ok(())
        })
    }

    fn on_record(&mut self, ctx: &mut ProcessorContext, _port: &str, record: Record) -> Result<(), ProcessorError> {
        let mut copy = ctx.copy_record(&record)?;
        (self.mapping)(&mut copy)?;
        ctx.dispatch_output(OUTPUT_PORT, copy)
    }
}

impl Processor for FieldMapper {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_PORT, self.schema.clone())]
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT_PORT, self.schema.clone())]
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
        match closure {
            InputClosure::Clean => ctx.output_finished(OUTPUT_PORT)?,
            InputClosure::Aborted => ctx.output_aborted(OUTPUT_PORT)?,
        }
        Ok(())
    }
}
