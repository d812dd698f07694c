// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::traits::PortDirection;

/// Violations of the port contract between a processor and the runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortContractError {
    #[error("'{component}' has no output port named '{port}'")]
    UndeclaredOutput { component: String, port: String },

    #[error("cannot dispatch on output port '{port}' of '{component}': port is closed")]
    OutputClosed { component: String, port: String },

    #[error("output port '{port}' of '{component}' was already finished")]
    AlreadyClosed { component: String, port: String },

    #[error("'{component}' declares {direction} port '{port}' more than once")]
    DuplicatePort {
        component: String,
        port: String,
        direction: PortDirection,
    },

    #[error("'{component}' has no handler for input port '{port}' and no fallback handler")]
    UnhandledInputPort { component: String, port: String },

    #[error("'{component}' has no more work but output ports {ports:?} were never finished")]
    OutputsLeftOpen { component: String, ports: Vec<String> },
}
