// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One processor's unit of execution.
//!
//! The unit calls `extract` once, closes unconnected optional inputs, then
//! blocks on its inbox and invokes hooks until the processor is done:
//!
//! * a processor with outputs is done once every output is closed
//! * a processor without outputs is done once every input has closed
//!
//! Any hook error or panic moves the processor to `Error`, closes its open
//! outputs with the aborted marker and raises the run failure flag. Siblings
//! keep running.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;

use crate::engine::context::{Delivery, ProcessorContext};
use crate::engine::report::ComponentOutcome;
use crate::errors::{PortContractError, ProcessorError, ProcessorFailure};
use crate::observability::messages::processor::{ProcessorFailed, ProcessorStateChanged};
use crate::observability::messages::StructuredLog;
use crate::trace::{ComponentState, TraceEvent};
use crate::traits::{InputClosure, InputHandlers, Processor};

/// Runtime wiring handed to a unit when the run starts.
pub(crate) struct UnitWiring {
    pub ctx: ProcessorContext,
    pub inbox: mpsc::Receiver<Delivery>,
    /// Number of upstream connections per connected input port.
    pub upstream: HashMap<String, usize>,
    /// Declared inputs nothing is connected to.
    pub unconnected: Vec<String>,
}

/// A registered processor with its type erased.
pub(crate) trait DynUnit: Send {
    fn run(self: Box<Self>, wiring: UnitWiring) -> ComponentOutcome;
}

pub(crate) struct Unit<P: Processor> {
    pub processor: P,
    pub handlers: InputHandlers<P>,
    pub class_name: &'static str,
}

struct Driver<'a, P: Processor> {
    processor: &'a mut P,
    handlers: &'a InputHandlers<P>,
    ctx: &'a mut ProcessorContext,
    inbox: &'a mut mpsc::Receiver<Delivery>,
    upstream: HashMap<String, usize>,
    aborted: HashSet<String>,
}

impl<P: Processor> DynUnit for Unit<P> {
    fn run(self: Box<Self>, wiring: UnitWiring) -> ComponentOutcome {
        let Unit {
            mut processor,
            handlers,
            class_name,
        } = *self;
        let UnitWiring {
            mut ctx,
            mut inbox,
            upstream,
            unconnected,
        } = wiring;

        let span = ProcessorStateChanged {
            component_id: ctx.component_id(),
            component_name: ctx.name(),
            state: ComponentState::Running.code(),
        }
        .span("processor_run");
        let _guard = span.enter();

        set_state(&ctx, ComponentState::Running);

        let result = Driver {
            processor: &mut processor,
            handlers: &handlers,
            ctx: &mut ctx,
            inbox: &mut inbox,
            upstream,
            aborted: HashSet::new(),
        }
        .drive(unconnected);

        // late deliveries to a finished processor are refused from here on
        inbox.close();

        let (state, failure) = match result {
            Ok(()) => (ComponentState::Finished, None),
            Err(source) => {
                ctx.abort_outputs();
                ctx.mark_run_failed();
                ProcessorFailed {
                    component_id: ctx.component_id(),
                    component_name: ctx.name(),
                    error: &source,
                }
                .log();
                let failure = ProcessorFailure {
                    component_id: ctx.component_id(),
                    component_name: ctx.name().to_string(),
                    source,
                };
                (ComponentState::Error, Some(failure))
            }
        };
        set_state(&ctx, state);

        ComponentOutcome {
            id: ctx.component_id(),
            name: ctx.name().to_string(),
            class_name: class_name.to_string(),
            state,
            failure,
        }
    }
}

impl<P: Processor> Driver<'_, P> {
    fn drive(&mut self, unconnected: Vec<String>) -> Result<(), ProcessorError> {
        guarded(|| self.processor.extract(&mut *self.ctx))?;

        for port in unconnected {
            if self.outputs_done() {
                return Ok(());
            }
            guarded(|| self.processor.handle_input_closed(&mut *self.ctx, &port, InputClosure::Clean))?;
        }

        loop {
            if self.is_done() {
                return Ok(());
            }
            if self.upstream.is_empty() {
                return Err(PortContractError::OutputsLeftOpen {
                    component: self.ctx.name().to_string(),
                    ports: self.ctx.open_output_names(),
                }
                .into());
            }

            match self.inbox.blocking_recv() {
                Some(Delivery::Record { port, record }) => {
                    let handler = self.handlers.resolve(&port).ok_or_else(|| {
                        PortContractError::UnhandledInputPort {
                            component: self.ctx.name().to_string(),
                            port: port.clone(),
                        }
                    })?;
                    guarded(|| handler(&mut *self.processor, &mut *self.ctx, &port, record))?;
                }
                Some(Delivery::Closed { port, closure }) => self.upstream_closed(port, closure)?,
                None => {
                    // every sender is gone without a closure notice
                    let ports: Vec<String> = self.upstream.keys().cloned().collect();
                    for port in ports {
                        self.upstream.insert(port.clone(), 1);
                        self.upstream_closed(port, InputClosure::Aborted)?;
                        if self.is_done() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn upstream_closed(&mut self, port: String, closure: InputClosure) -> Result<(), ProcessorError> {
        let Some(remaining) = self.upstream.get_mut(&port) else {
            return Ok(());
        };
        *remaining = remaining.saturating_sub(1);
        if !closure.is_clean() {
            self.aborted.insert(port.clone());
        }
        if *remaining > 0 {
            return Ok(());
        }

        self.upstream.remove(&port);
        let closure = if self.aborted.contains(&port) {
            InputClosure::Aborted
        } else {
            InputClosure::Clean
        };
        guarded(|| self.processor.handle_input_closed(&mut *self.ctx, &port, closure))
    }

    fn is_done(&self) -> bool {
        if self.ctx.has_outputs() {
            self.outputs_done()
        } else {
            self.upstream.is_empty()
        }
    }

    fn outputs_done(&self) -> bool {
        self.ctx.has_outputs() && self.ctx.all_outputs_closed()
    }
}

fn set_state(ctx: &ProcessorContext, state: ComponentState) {
    ProcessorStateChanged {
        component_id: ctx.component_id(),
        component_name: ctx.name(),
        state: state.code(),
    }
    .log();
    ctx.trace().submit(TraceEvent::ComponentStateChange {
        id: ctx.component_id(),
        state,
    });
}

/// Run a hook, turning a panic into an error.
fn guarded<F>(hook: F) -> Result<(), ProcessorError>
where
    F: FnOnce() -> Result<(), ProcessorError>,
{
    catch_unwind(AssertUnwindSafe(hook))
        .unwrap_or_else(|payload| Err(ProcessorError::Panicked(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
