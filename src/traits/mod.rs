// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod port;
pub mod processor;

pub use port::{PortDirection, PortSpec, SchemaRef};
pub use processor::{InputClosure, InputHandler, InputHandlers, Processor};
