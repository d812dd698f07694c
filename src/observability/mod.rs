// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Operational log lines are not written inline. Each one is a small message
//! struct in [`messages`] implementing `Display` and
//! [`StructuredLog`](messages::StructuredLog), so the text and the structured
//! fields live in one place per subsystem.
//!
//! This is application logging only. The durable record of a run lives in the
//! trace store (see [`crate::trace`]); failures to write there are logged here
//! and never reach the pipeline.
//!
//! # Usage
//!
//! ```rust
//! use the_conduit::observability::messages::{engine::PipelineStarted, StructuredLog};
//!
//! PipelineStarted {
//!     processor_count: 3,
//!     connection_count: 2,
//!     queue_capacity: 128,
//! }
//! .log();
//! ```

pub mod messages;
