// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub(crate) mod context;
mod driver;
mod pipeline;
mod report;
#[cfg(test)]
mod integration_tests;

pub use context::ProcessorContext;
pub use pipeline::Pipeline;
pub use report::{ComponentOutcome, RunReport};
