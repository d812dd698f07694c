// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for processor hooks and the processor boundary.

use thiserror::Error;

use crate::errors::{PortContractError, RecordError};
use crate::ids::ComponentId;

/// Error returned from a processor hook (`extract`, input handlers,
/// `handle_input_closed`).
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Port(#[from] PortContractError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hook panicked; the panic was caught at the unit boundary.
    #[error("processor hook panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl ProcessorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// An unrecovered hook error attributed to the component that raised it.
///
/// Terminal for the component, non-terminal for the rest of the run.
#[derive(Error, Debug)]
#[error("processor '{component_name}' ({component_id}) failed: {source}")]
pub struct ProcessorFailure {
    pub component_id: ComponentId,
    pub component_name: String,
    #[source]
    pub source: ProcessorError,
}
