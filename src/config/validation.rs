// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static checks on a [`PipelineConfig`] before any processor is added.
//!
//! Problems are accumulated so a user sees all of them at once. Checks that
//! need the processors themselves (unknown components, undeclared ports,
//! unconnected required inputs) happen when the wiring is applied.

use crate::config::PipelineConfig;
use crate::errors::ConfigError;

/// Validate option values and connection endpoint syntax.
///
/// # Returns
///
/// * `Ok(())` - The configuration can be used to build a pipeline
/// * `Err(Vec<ConfigError>)` - Every problem found, in file order
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.queue_capacity == 0 {
        errors.push(ConfigError::ZeroQueueCapacity);
    }

    if let Some(trace) = &config.trace {
        if trace.commit_every == 0 {
            errors.push(ConfigError::ZeroCommitInterval);
        }
    }

    for connection in &config.connections {
        if let Err(err) = connection.endpoints() {
            errors.push(err);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
