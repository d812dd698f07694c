// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::RunReport;
use crate::errors::{ConfigError, PortContractError, TraceError, WiringError};

/// Run-level errors returned by [`Pipeline`](crate::engine::Pipeline).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Wiring(#[from] WiringError),

    /// A processor's declaration was rejected when it was added.
    #[error(transparent)]
    Registration(#[from] PortContractError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare working directory '{}': {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every processor reached a terminal state but at least one ended in error.
    #[error("pipeline run failed: {}", failed_components(.0))]
    RunFailed(Box<RunReport>),
}

impl PipelineError {
    /// The run report, when the run got far enough to produce one.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            PipelineError::RunFailed(report) => Some(report),
            _ => None,
        }
    }
}

fn failed_components(report: &RunReport) -> String {
    report
        .failures()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
