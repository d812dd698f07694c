// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - pipeline run lifecycle
//! * `processor` - processor registration, state changes and failures
//! * `trace` - tracer lifecycle and trace write problems

pub mod engine;
pub mod processor;
pub mod trace;

use tracing::Span;

/// A log message that knows its level and its structured fields.
pub trait StructuredLog {
    /// Emit the message at its level with structured fields.
    fn log(&self);

    /// Open a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
