// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::traits::PortDirection;

/// Errors found while wiring processors together before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    /// A connection names a component that was never added
    UnknownComponent {
        /// The name used in the connection
        name: String,
    },
    /// Two processors were added under the same name
    DuplicateComponentName {
        /// The duplicate name
        name: String,
    },
    /// A connection references a port the processor never declared
    UndeclaredPort {
        component: String,
        port: String,
        direction: PortDirection,
    },
    /// A required input port has no upstream connection
    RequiredInputUnconnected {
        component: String,
        port: String,
    },
    /// The same output port is wired to the same input port twice
    DuplicateConnection {
        from: String,
        to: String,
    },
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WiringError::UnknownComponent { name } => {
                write!(f, "No processor named '{}' has been added", name)
            }
            WiringError::DuplicateComponentName { name } => {
                write!(f, "Duplicate processor name: '{}'", name)
            }
            WiringError::UndeclaredPort {
                component,
                port,
                direction,
            } => {
                write!(
                    f,
                    "Processor '{}' does not declare an {} port named '{}'",
                    component, direction, port
                )
            }
            WiringError::RequiredInputUnconnected { component, port } => {
                write!(
                    f,
                    "Required input port '{}.{}' is not connected to any output",
                    component, port
                )
            }
            WiringError::DuplicateConnection { from, to } => {
                write!(f, "Connection {} -> {} is declared more than once", from, to)
            }
        }
    }
}

impl std::error::Error for WiringError {}

/// Errors raised while loading or validating a pipeline configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format for '{}' (expected .yaml, .yml or .toml)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("trace.commit_every must be at least 1")]
    ZeroCommitInterval,

    #[error("endpoint '{endpoint}' is not of the form <component>.<port>")]
    MalformedEndpoint { endpoint: String },

    #[error("configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ConfigError>),
}

fn join_lines(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
