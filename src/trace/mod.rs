// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Trace recording.
//!
//! A run's lifecycle, wiring and record flow are written to an embedded
//! SQLite store. [`Tracer`] owns the writing side on its own thread;
//! [`TraceDb`] handles opened read-only serve analysis, during or after a run.

pub mod action;
pub mod db;
pub mod entities;
pub mod schema;
pub mod tracer;

pub use action::{TraceAction, TraceEvent};
pub use db::{TraceDb, TraceMode, TraceRows};
pub use entities::{
    ComponentState, ComponentTrace, ConnectionStats, ConnectionTrace, EnvelopeTrace, PortTrace,
    RecordTrace,
};
pub use schema::TRACE_SCHEMA_VERSION;
pub use tracer::{TraceHandle, Tracer, TracerSummary};
