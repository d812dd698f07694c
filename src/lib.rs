// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // run options + wiring files
pub mod engine;     // pipeline runtime
pub mod errors;     // error handling
pub mod ids;
pub mod observability;
pub mod processors; // stock processors
pub mod record;     // records + serials + freezing
pub mod trace;      // trace store + tracer
pub mod traits;     // processor contract
