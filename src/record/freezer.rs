// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::errors::FreezeError;

/// Value normalization applied to every field when a record is frozen.
///
/// Supplied by the schema layer. Must be a pure mapping; it must not fail for
/// values the pipeline legally produces. Any error it does return is wrapped
/// as [`RecordError::FreezeFailed`](crate::errors::RecordError::FreezeFailed).
pub trait Freezer: Send + Sync {
    fn freeze(&self, value: Value) -> Result<Value, FreezeError>;
}

/// Freezer that keeps every value as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFreezer;

impl Freezer for PassthroughFreezer {
    fn freeze(&self, value: Value) -> Result<Value, FreezeError> {
        Ok(value)
    }
}

impl<F> Freezer for F
where
    F: Fn(Value) -> Result<Value, FreezeError> + Send + Sync,
{
    fn freeze(&self, value: Value) -> Result<Value, FreezeError> {
        self(value)
    }
}
