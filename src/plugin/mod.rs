// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugins as the pipeline sees them.
//!
//! * `loader` - builds a described, shareable `Plugin` from a module
//! * `metadata` - the self-description payload and its capability table
//! * `registry` - registrations, component factories and the factory map
//! * `wrapper` - the start/stop state machine around live instances

pub mod loader;
pub mod metadata;
pub mod registry;
pub mod wrapper;

#[cfg(test)]
mod integration_tests;

pub use loader::{Plugin, PluginLoader, PluginOptions};
pub use metadata::{PluginMetadata, StabilityLevel};
pub use registry::{build_registrations, ComponentFactory, FactoryMap, HandlerFactory, Registration};
pub use wrapper::{OperationalWrapper, WrapperState};
