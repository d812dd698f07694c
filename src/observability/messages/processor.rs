// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for processor registration, lifecycle and delivery events.

use crate::ids::{ComponentId, ConnectionId};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Processor added to a pipeline.
///
/// # Log Level
/// `debug!` - Wiring detail
pub struct ProcessorRegistered<'a> {
    pub component_id: ComponentId,
    pub component_name: &'a str,
    pub class_name: &'a str,
    pub inputs: usize,
    pub outputs: usize,
}

impl Display for ProcessorRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered processor '{}' ({}) as {}: {} inputs, {} outputs",
            self.component_name, self.class_name, self.component_id, self.inputs, self.outputs
        )
    }
}

impl StructuredLog for ProcessorRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            component_id = self.component_id.0,
            component_name = self.component_name,
            class_name = self.class_name,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "processor_registered",
            span_name = name,
            component_id = self.component_id.0,
            component_name = self.component_name,
        )
    }
}

/// Processor moved to a new lifecycle state.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ProcessorStateChanged<'a> {
    pub component_id: ComponentId,
    pub component_name: &'a str,
    pub state: &'a str,
}

impl Display for ProcessorStateChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' ({}) is now {}",
            self.component_name, self.component_id, self.state
        )
    }
}

impl StructuredLog for ProcessorStateChanged<'_> {
    fn log(&self) {
        tracing::info!(
            component_id = self.component_id.0,
            component_name = self.component_name,
            state = self.state,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "processor",
            span_name = name,
            component_id = self.component_id.0,
            component_name = self.component_name,
        )
    }
}

/// A processor hook failed; the processor is now in error.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ProcessorFailed<'a> {
    pub component_id: ComponentId,
    pub component_name: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ProcessorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' ({}) failed: {}",
            self.component_name, self.component_id, self.error
        )
    }
}

impl StructuredLog for ProcessorFailed<'_> {
    fn log(&self) {
        tracing::error!(
            component_id = self.component_id.0,
            component_name = self.component_name,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "processor_failed",
            span_name = name,
            component_id = self.component_id.0,
            component_name = self.component_name,
        )
    }
}

/// A delivery could not be made because the destination already finished.
///
/// # Log Level
/// `debug!` - Expected when a consumer closes its outputs early
pub struct DeliveryDropped<'a> {
    pub component_name: &'a str,
    pub port: &'a str,
    pub connection_id: ConnectionId,
}

impl Display for DeliveryDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropped delivery from '{}.{}' on {}: destination has finished",
            self.component_name, self.port, self.connection_id
        )
    }
}

impl StructuredLog for DeliveryDropped<'_> {
    fn log(&self) {
        tracing::debug!(
            component_name = self.component_name,
            port = self.port,
            connection_id = self.connection_id.0,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "delivery_dropped",
            span_name = name,
            connection_id = self.connection_id.0,
        )
    }
}
