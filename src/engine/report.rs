// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

use crate::errors::ProcessorFailure;
use crate::ids::ComponentId;
use crate::trace::{ComponentState, TracerSummary};

/// How one processor ended.
#[derive(Debug)]
pub struct ComponentOutcome {
    pub id: ComponentId,
    pub name: String,
    pub class_name: String,
    pub state: ComponentState,
    pub failure: Option<ProcessorFailure>,
}

/// Result of a completed run: every processor reached a terminal state.
#[derive(Debug)]
pub struct RunReport {
    /// `Finished` unless some processor ended in `Error`.
    pub state: ComponentState,
    /// Outcomes in registration order.
    pub components: Vec<ComponentOutcome>,
    /// Present when the run was traced.
    pub tracer: Option<TracerSummary>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.state == ComponentState::Finished
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessorFailure> {
        self.components.iter().filter_map(|c| c.failure.as_ref())
    }

    pub fn component(&self, name: &str) -> Option<&ComponentOutcome> {
        self.components.iter().find(|c| c.name == name)
    }
}
