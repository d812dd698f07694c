// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default bound of every processor inbox, in deliveries.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
/// Default number of deferred trace writes between forced commits.
pub const DEFAULT_COMMIT_EVERY: usize = 256;
/// Subdirectory of a processor's working directory for persistent output.
pub const DATA_DIR_NAME: &str = "data";
/// Subdirectory of a processor's working directory for scratch files.
pub const TMP_DIR_NAME: &str = "tmp";
