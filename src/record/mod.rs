// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Records flowing between processors.
//!
//! A [`Record`] is a keyed value container that is mutable while its creating
//! processor builds it and immutable once frozen. The runtime freezes every
//! record before it crosses a port boundary, so a downstream processor can
//! never observe a record changing under it.
//!
//! Fields keep insertion order; display formatting depends on it.
//!
//! # Example
//! ```
//! use the_conduit::record::{PassthroughFreezer, Record, SerialAllocator};
//!
//! let serials = SerialAllocator::new();
//! let mut rec = Record::new(&serials, "customer");
//! rec.set("id", 7).unwrap();
//! rec.freeze(&PassthroughFreezer, &serials).unwrap();
//!
//! assert!(rec.set("id", 8).is_err());
//! assert_eq!(rec.get("id").unwrap(), 7);
//! ```

mod format;
mod freezer;
mod serial;

use std::fmt;

use serde_json::{Map, Value};

use crate::errors::RecordError;
use crate::ids::ComponentId;

pub use freezer::{Freezer, PassthroughFreezer};
pub use serial::{Serial, SerialAllocator};

/// Where a record entered the pipeline: the component and output port that
/// first dispatched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub component_id: ComponentId,
    pub component_name: String,
    pub port: String,
}

#[derive(Debug, Clone)]
pub struct Record {
    record_type: String,
    serial: Option<Serial>,
    fields: Map<String, Value>,
    frozen: bool,
    origin: Option<Origin>,
}

impl Record {
    /// New, empty, unfrozen record with a fresh serial.
    pub fn new(serials: &SerialAllocator, record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            serial: Some(serials.next_serial()),
            fields: Map::new(),
            frozen: false,
            origin: None,
        }
    }

    /// New unfrozen record pre-populated with `fields`, in iteration order.
    pub fn with_fields<I, K, V>(serials: &SerialAllocator, record_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new(serials, record_type);
        for (key, value) in fields {
            record.fields.insert(key.into(), value.into());
        }
        record
    }

    /// Record without a serial; one is assigned when it is frozen.
    pub fn detached(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            serial: None,
            fields: Map::new(),
            frozen: false,
            origin: None,
        }
    }

    /// Informational type tag. Never checked by the runtime.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), RecordError> {
        self.assert_not_frozen()?;
        self.fields.insert(name.into(), value.into());
        Ok(())
    }

    /// Look up a field. An unset field is an error, never a default.
    pub fn get(&self, name: &str) -> Result<&Value, RecordError> {
        self.fields
            .get(name)
            .ok_or_else(|| RecordError::InvalidFieldKey {
                record_type: self.record_type.clone(),
                key: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Freeze the record against further updates.
    ///
    /// Assigns a serial if the record has none, runs every field through
    /// `freezer`, then marks the record frozen. A no-op on a frozen record:
    /// the serial is kept and the freezer is not run again. If the freezer
    /// rejects a value the record is left untouched and unfrozen.
    pub fn freeze(&mut self, freezer: &dyn Freezer, serials: &SerialAllocator) -> Result<(), RecordError> {
        if self.frozen {
            return Ok(());
        }

        let mut frozen_fields = Map::new();
        for (key, value) in &self.fields {
            let frozen_value = freezer
                .freeze(value.clone())
                .map_err(|e| RecordError::FreezeFailed {
                    field: key.clone(),
                    reason: e.to_string(),
                })?;
            frozen_fields.insert(key.clone(), frozen_value);
        }

        if self.serial.is_none() {
            self.serial = Some(serials.next_serial());
        }
        self.fields = frozen_fields;
        self.frozen = true;
        Ok(())
    }

    /// Mutable copy of a frozen record: same type and fields, new serial,
    /// no origin.
    pub fn copy(&self, serials: &SerialAllocator) -> Result<Record, RecordError> {
        if !self.frozen {
            return Err(RecordError::NotFrozen {
                record_type: self.record_type.clone(),
            });
        }
        Ok(Record {
            record_type: self.record_type.clone(),
            serial: Some(serials.next_serial()),
            fields: self.fields.clone(),
            frozen: false,
            origin: None,
        })
    }

    pub fn set_origin(&mut self, origin: Origin) -> Result<(), RecordError> {
        self.assert_not_frozen()?;
        self.origin = Some(origin);
        Ok(())
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn origin_component_id(&self) -> Option<ComponentId> {
        self.origin.as_ref().map(|o| o.component_id)
    }

    pub fn origin_component_name(&self) -> Option<&str> {
        self.origin.as_ref().map(|o| o.component_name.as_str())
    }

    pub fn origin_port(&self) -> Option<&str> {
        self.origin.as_ref().map(|o| o.port.as_str())
    }

    fn assert_not_frozen(&self) -> Result<(), RecordError> {
        if self.frozen {
            return Err(RecordError::FrozenRecordMutation {
                record_type: self.record_type.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serial = self
            .serial
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}[{}] {}",
            self.record_type,
            serial,
            Value::Object(self.fields.clone())
        )
    }
}
