// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the trace store.
///
/// These signal collaborator misuse (writing through a read-only handle,
/// creating over an existing file, opening a missing one) and are returned
/// directly to the caller.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("trace store '{}' is open read-only", path.display())]
    ReadOnly { path: PathBuf },

    #[error("trace store '{}' already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("trace store '{}' does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("trace store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("trace store lock poisoned")]
    LockPoisoned,

    #[error("invalid trace timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("query returned no rows: {sql}")]
    NoRows { sql: String },

    #[error("failed to start tracer thread: {0}")]
    TracerStart(#[source] std::io::Error),
}

impl TraceError {
    /// True for create-on-existing and open-on-missing failures.
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::Missing { .. })
    }
}
