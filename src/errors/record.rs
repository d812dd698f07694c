// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the record model.

use thiserror::Error;

/// Contract violations on a single [`Record`](crate::record::Record).
///
/// These are local errors: they surface immediately to the caller and, when
/// they escape a processor hook, become a processor failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A field write or origin assignment was attempted on a frozen record.
    #[error("{record_type} record is frozen and cannot be modified")]
    FrozenRecordMutation { record_type: String },

    /// A field that was never set was looked up.
    #[error("{record_type} record has no '{key}' field")]
    InvalidFieldKey { record_type: String, key: String },

    /// `copy()` was called on a record that is still mutable.
    #[error("{record_type} record must be frozen before it can be copied")]
    NotFrozen { record_type: String },

    /// The injected freezer rejected a field value.
    #[error("failed to freeze field '{field}': {reason}")]
    FreezeFailed { field: String, reason: String },
}

/// Error reported by a [`Freezer`](crate::record::Freezer) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FreezeError(pub String);
