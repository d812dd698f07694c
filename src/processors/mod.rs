// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stock processors for assembling small pipelines and tests.

pub mod field_mapper;
pub mod record_collector;
pub mod static_source;

pub use field_mapper::FieldMapper;
pub use record_collector::{CollectedRecords, RecordCollector};
pub use static_source::StaticSource;
