// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host configuration validation.
//!
//! All checks run and every problem is reported, so one pass over a broken
//! file shows everything that needs fixing.

use crate::config::consts::MIN_MAX_MEMORY_BYTES;
use crate::config::HostConfig;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No plugins configured")]
    NoPlugins,

    #[error("Plugin at position {index} has an empty id")]
    EmptyPluginId { index: usize },

    #[error("Duplicate plugin id '{plugin_id}'")]
    DuplicatePluginId { plugin_id: String },

    #[error("Plugin '{plugin_id}' has an empty module path")]
    EmptyModulePath { plugin_id: String },

    #[error("Fuel minimum {minimum} exceeds maximum {maximum}")]
    InvertedFuelBounds { minimum: u64, maximum: u64 },

    #[error("Memory limit {max_bytes} is below the minimum of {minimum} bytes")]
    MemoryLimitTooSmall { max_bytes: usize, minimum: usize },
}

pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.plugins.is_empty() {
        errors.push(ValidationError::NoPlugins);
    }

    let mut seen = HashSet::new();
    for (index, plugin) in config.plugins.iter().enumerate() {
        if plugin.id.trim().is_empty() {
            errors.push(ValidationError::EmptyPluginId { index });
        } else if !seen.insert(plugin.id.as_str()) {
            errors.push(ValidationError::DuplicatePluginId {
                plugin_id: plugin.id.clone(),
            });
        }

        if plugin.module.trim().is_empty() {
            errors.push(ValidationError::EmptyModulePath {
                plugin_id: plugin.id.clone(),
            });
        }
    }

    let fuel = &config.wasm.fuel;
    if fuel.get_minimum() > fuel.get_maximum() {
        errors.push(ValidationError::InvertedFuelBounds {
            minimum: fuel.get_minimum(),
            maximum: fuel.get_maximum(),
        });
    }

    if config.wasm.memory.max_bytes < MIN_MAX_MEMORY_BYTES {
        errors.push(ValidationError::MemoryLimitTooSmall {
            max_bytes: config.wasm.memory.max_bytes,
            minimum: MIN_MAX_MEMORY_BYTES,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
