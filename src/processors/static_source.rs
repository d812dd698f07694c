// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{Map, Value};

use crate::engine::ProcessorContext;
use crate::errors::ProcessorError;
use crate::traits::{PortSpec, Processor};

pub const OUTPUT_PORT: &str = "out";

/// Source processor: emits a fixed list of field sets on `out`, in order,
/// then closes `out`.
pub struct StaticSource {
    record_type: String,
    rows: Vec<Map<String, Value>>,
}

impl StaticSource {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            rows: Vec::new(),
        }
    }

    /// Add one row. Fields keep the order given.
    pub fn with_row<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.rows.push(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Rows from JSON values. Objects become one field per key; any other
    /// value becomes a single `value` field.
    pub fn from_json(record_type: impl Into<String>, rows: impl IntoIterator<Item = Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(fields) => fields,
                other => {
                    let mut fields = Map::new();
                    fields.insert("value".to_string(), other);
                    fields
                }
            })
            .collect();
        Self {
            record_type: record_type.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Processor for StaticSource {
    fn list_input_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn list_output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT_PORT, self.record_type.clone())]
    }

    fn extract(&mut self, ctx: &mut ProcessorContext) -> Result<(), ProcessorError> {
        for row in std::mem::take(&mut self.rows) {
            let mut record = ctx.new_record(self.record_type.clone());
            for (name, value) in row {
                record.set(name, value)?;
            }
            ctx.dispatch_output(OUTPUT_PORT, record)?;
        }
        ctx.output_finished(OUTPUT_PORT)?;
        Ok(())
    }
}
