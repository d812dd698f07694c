// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the pipeline run lifecycle.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Pipeline run started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineStarted {
    pub processor_count: usize,
    pub connection_count: usize,
    pub queue_capacity: usize,
}

impl Display for PipelineStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting pipeline: {} processors, {} connections, queue_capacity={}",
            self.processor_count, self.connection_count, self.queue_capacity
        )
    }
}

impl StructuredLog for PipelineStarted {
    fn log(&self) {
        tracing::info!(
            processor_count = self.processor_count,
            connection_count = self.connection_count,
            queue_capacity = self.queue_capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            processor_count = self.processor_count,
            connection_count = self.connection_count,
        )
    }
}

/// Every processor finished cleanly.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineCompleted {
    pub processor_count: usize,
    pub duration: Duration,
}

impl Display for PipelineCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline finished: {} processors in {:?}",
            self.processor_count, self.duration
        )
    }
}

impl StructuredLog for PipelineCompleted {
    fn log(&self) {
        tracing::info!(
            processor_count = self.processor_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_completed",
            span_name = name,
            processor_count = self.processor_count,
        )
    }
}

/// The run ended with at least one processor in error.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct PipelineFailed<'a> {
    pub failed: &'a [&'a str],
    pub processor_count: usize,
    pub duration: Duration,
}

impl Display for PipelineFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline failed after {:?}: {} of {} processors in error ({})",
            self.duration,
            self.failed.len(),
            self.processor_count,
            self.failed.join(", ")
        )
    }
}

impl StructuredLog for PipelineFailed<'_> {
    fn log(&self) {
        tracing::error!(
            failed_count = self.failed.len(),
            processor_count = self.processor_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "pipeline_failed",
            span_name = name,
            failed_count = self.failed.len(),
        )
    }
}
