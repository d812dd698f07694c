// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the tracer thread and trace store writes.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::Span;

/// Tracer thread started draining the trace queue.
///
/// # Log Level
/// `info!` - Important operational event
pub struct TracerStarted<'a> {
    pub path: &'a Path,
    pub commit_every: usize,
}

impl Display for TracerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tracer writing to '{}' (commit_every={})",
            self.path.display(),
            self.commit_every
        )
    }
}

impl StructuredLog for TracerStarted<'_> {
    fn log(&self) {
        tracing::info!(
            path = %self.path.display(),
            commit_every = self.commit_every,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("tracer", span_name = name, path = %self.path.display())
    }
}

/// Tracer drained its queue and stopped.
///
/// # Log Level
/// `info!` - Important operational event
pub struct TracerStopped {
    pub applied: u64,
    pub failed: u64,
}

impl Display for TracerStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tracer stopped: {} actions applied, {} failed",
            self.applied, self.failed
        )
    }
}

impl StructuredLog for TracerStopped {
    fn log(&self) {
        tracing::info!(applied = self.applied, failed = self.failed, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("tracer_stopped", span_name = name, applied = self.applied)
    }
}

/// A trace action could not be written. The run continues.
///
/// # Log Level
/// `error!` - Trace data is incomplete
pub struct TraceWriteFailed<'a> {
    pub action: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TraceWriteFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to write trace action {}: {}", self.action, self.error)
    }
}

impl StructuredLog for TraceWriteFailed<'_> {
    fn log(&self) {
        tracing::error!(action = self.action, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("trace_write_failed", span_name = name, action = self.action)
    }
}

/// A trace action was submitted after the tracer stopped.
///
/// # Log Level
/// `warn!` - Trace data is incomplete
pub struct TraceActionDropped<'a> {
    pub action: &'a str,
}

impl Display for TraceActionDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Dropped trace action {}: tracer is not running", self.action)
    }
}

impl StructuredLog for TraceActionDropped<'_> {
    fn log(&self) {
        tracing::warn!(action = self.action, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("trace_action_dropped", span_name = name, action = self.action)
    }
}
