// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod merge;
mod validation;

pub mod consts;

pub use loader::{
    load_and_validate_config, load_config, parse_config, FuelConfig, HostConfig, MemoryConfig,
    PluginConfig, WasmConfig,
};
pub use merge::merge_config;
pub use validation::{validate_config, ValidationError};
