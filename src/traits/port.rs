// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use serde::Serialize;

/// Which side of a processor a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// Single-letter code stored in the trace store.
    pub fn code(self) -> &'static str {
        match self {
            PortDirection::Input => "i",
            PortDirection::Output => "o",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(PortDirection::Input),
            "o" => Some(PortDirection::Output),
            _ => None,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Name of the record schema a port carries.
///
/// The runtime never validates against it; it is recorded for tracing and
/// left to the schema layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef(String);

impl SchemaRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A port declaration: name, schema, and whether it may stay unconnected.
///
/// Declared once by a processor and read once, at wiring time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub schema: SchemaRef,
    pub optional: bool,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: SchemaRef::new(schema),
            optional: false,
        }
    }

    /// Input ports marked optional may be left unconnected.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
