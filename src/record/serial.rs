// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Ascending, unique record serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Serial(pub u64);

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out record serials for one run.
///
/// The runtime owns one allocator and shares it with every processor unit, so
/// serials are unique across the run. Tests can start the sequence anywhere
/// to get deterministic serials.
#[derive(Debug)]
pub struct SerialAllocator {
    next: AtomicU64,
}

impl SerialAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_serial(&self) -> Serial {
        Serial(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The serial the next call to [`next_serial`](Self::next_serial) will return.
    pub fn peek(&self) -> Serial {
        Serial(self.next.load(Ordering::Relaxed))
    }
}

impl Default for SerialAllocator {
    fn default() -> Self {
        Self::new()
    }
}
