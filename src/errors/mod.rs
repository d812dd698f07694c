// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod port;
mod processor;
mod record;
mod trace;

pub use config::{ConfigError, WiringError};
pub use execution::PipelineError;
pub use port::PortContractError;
pub use processor::{ProcessorError, ProcessorFailure};
pub use record::{FreezeError, RecordError};
pub use trace::TraceError;
