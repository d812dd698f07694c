// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The processor contract.
//!
//! A processor declares its ports, optionally extracts records on its own,
//! and reacts to records and closure notices arriving on its input ports.
//! Every hook runs on the processor's own unit of execution and receives a
//! [`ProcessorContext`] for dispatching, holding and closing outputs.
//!
//! Input records are routed through an explicit [`InputHandlers`] table
//! built when the processor is added to a pipeline: a handler per port name,
//! plus an optional fallback for any port without one. A declared input port
//! covered by neither is rejected up front.
//!
//! # Example
//! ```
//! use the_conduit::engine::ProcessorContext;
//! use the_conduit::errors::ProcessorError;
//! use the_conduit::record::Record;
//! use the_conduit::traits::{InputClosure, InputHandlers, PortSpec, Processor};
//!
//! struct Forward;
//!
//! impl Forward {
//!     fn on_rows(&mut self, ctx: &mut ProcessorContext, _port: &str, record: Record) -> Result<(), ProcessorError> {
//!         ctx.dispatch_output("out", record)
//!     }
//! }
//!
//! impl Processor for Forward {
//!     fn list_input_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("rows", "row")]
//!     }
//!
//!     fn list_output_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("out", "row")]
//!     }
//!
//!     fn register_input_handlers(&self, handlers: &mut InputHandlers<Self>) {
//!         handlers.on("rows", Self::on_rows);
//!     }
//!
//!     fn handle_input_closed(&mut self, ctx: &mut ProcessorContext, _port: &str, _closure: InputClosure) -> Result<(), ProcessorError> {
//!         ctx.output_finished("out")?;
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use crate::engine::ProcessorContext;
use crate::errors::{PortContractError, ProcessorError};
use crate::record::Record;
use crate::traits::PortSpec;

/// Handler invoked once per record arriving on an input port.
///
/// Receives the input port name so a fallback handler can tell ports apart.
pub type InputHandler<P> =
    fn(&mut P, &mut ProcessorContext, &str, Record) -> Result<(), ProcessorError>;

/// How an input port was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClosure {
    /// Every upstream output finished normally.
    Clean,
    /// At least one upstream processor failed before finishing.
    Aborted,
}

impl InputClosure {
    pub fn is_clean(self) -> bool {
        matches!(self, InputClosure::Clean)
    }
}

pub trait Processor: Send + 'static {
    /// Class name recorded in the trace store.
    fn class_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Input ports, in declaration order.
    fn list_input_ports(&self) -> Vec<PortSpec>;

    /// Output ports, in declaration order.
    fn list_output_ports(&self) -> Vec<PortSpec>;

    /// Fill the input handler table. Called once, when the processor is added.
    fn register_input_handlers(&self, _handlers: &mut InputHandlers<Self>)
    where
        Self: Sized,
    {
    }

    /// Runs exactly once, before any input is delivered.
    fn extract(&mut self, _ctx: &mut ProcessorContext) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Runs exactly once per input port, after its last record.
    fn handle_input_closed(
        &mut self,
        _ctx: &mut ProcessorContext,
        _port: &str,
        _closure: InputClosure,
    ) -> Result<(), ProcessorError> {
        Ok(())
    }
}

/// Port name to handler lookup table with an optional fallback.
pub struct InputHandlers<P> {
    by_port: HashMap<String, InputHandler<P>>,
    fallback: Option<InputHandler<P>>,
}

impl<P> InputHandlers<P> {
    pub fn new() -> Self {
        Self {
            by_port: HashMap::new(),
            fallback: None,
        }
    }

    /// Handle records arriving on `port`.
    pub fn on(&mut self, port: impl Into<String>, handler: InputHandler<P>) -> &mut Self {
        self.by_port.insert(port.into(), handler);
        self
    }

    /// Handle records on any port without a dedicated handler.
    pub fn on_any(&mut self, handler: InputHandler<P>) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    pub fn resolve(&self, port: &str) -> Option<InputHandler<P>> {
        self.by_port.get(port).copied().or(self.fallback)
    }

    /// Every declared input port must resolve to a handler.
    pub(crate) fn check_covers(&self, component: &str, inputs: &[PortSpec]) -> Result<(), PortContractError> {
        match inputs.iter().find(|port| self.resolve(&port.name).is_none()) {
            Some(port) => Err(PortContractError::UnhandledInputPort {
                component: component.to_string(),
                port: port.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl<P> Default for InputHandlers<P> {
    fn default() -> Self {
        Self::new()
    }
}
