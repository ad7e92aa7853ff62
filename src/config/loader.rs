// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_FUEL_LEVEL, DEFAULT_MAX_MEMORY_BYTES, MAX_FUEL_LEVEL, MIN_FUEL_LEVEL,
};
use crate::observability::messages::validation::FuelLevelClamped;
use crate::pipeline::Role;
use crate::wasm::compiler::ExportSurface;
use crate::wasm::environment::SocketPolicy;
use crate::wasm::error::{PluginError, PluginResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level host configuration.
///
/// # Example
/// ```yaml
/// wasm:
///   fuel:
///     default: 100000000
///   memory:
///     max_bytes: 67108864
/// plugins:
///   - id: "webhook"
///     role: receiver
///     module: "plugins/webhook.wasm"
///     config:
///       endpoint: "127.0.0.1:8080"
/// ```
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub wasm: WasmConfig,
    pub plugins: Vec<PluginConfig>,
}

/// Sandbox settings shared by every plugin.
///
/// # Fields
/// * `fuel` - Per-call execution budget and its bounds
/// * `memory` - Linear memory growth limit
/// * `sockets` - Network access granted to guests (default: none)
/// * `inherit_stdio` - Whether guests write to the host's stdout/stderr
#[derive(Debug, Clone, Deserialize)]
pub struct WasmConfig {
    #[serde(default)]
    pub fuel: FuelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sockets: SocketPolicy,
    #[serde(default = "default_inherit_stdio")]
    pub inherit_stdio: bool,
}

fn default_inherit_stdio() -> bool {
    true
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            fuel: FuelConfig::default(),
            memory: MemoryConfig::default(),
            sockets: SocketPolicy::default(),
            inherit_stdio: default_inherit_stdio(),
        }
    }
}

/// Fuel budget for guest calls.
///
/// Fuel bounds every call to a finite number of instructions, so a guest
/// stuck in a loop traps instead of hanging the host.
///
/// ```yaml
/// fuel:
///   default: 100000000   # 100 million instructions
///   minimum: 1000000
///   maximum: 500000000   # hard limit
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    pub fn get_default(&self) -> u64 {
        self.validate_and_clamp(self.default.unwrap_or(DEFAULT_FUEL_LEVEL))
    }

    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamps a requested budget to `[minimum, maximum]`.
    ///
    /// Assumes the bounds were validated; an inverted range returns `maximum`.
    ///
    /// ```
    /// use wasi_plugin_host::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// assert_eq!(config.validate_and_clamp(1_000_000_000), 500_000_000);
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum();

        let clamped = requested.max(min).min(max);
        if clamped != requested {
            tracing::warn!(
                "{}",
                FuelLevelClamped {
                    requested,
                    applied: clamped,
                }
            );
        }
        clamped
    }

    /// Budget for one plugin: its own request if any, else the default.
    pub fn resolve(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(fuel) => self.validate_and_clamp(fuel),
            None => self.get_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_MEMORY_BYTES
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

/// One plugin module to load.
///
/// # Fields
/// * `id` - Unique name of this entry
/// * `role` - Pipeline role of the components it creates
/// * `module` - Path of the `.wasm` file
/// * `surface` - Export contract to validate against (default `lifecycle`)
/// * `fuel` - Per-plugin fuel budget, clamped to the global bounds
/// * `config` - Overrides merged over the plugin's default configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub id: String,
    pub role: Role,
    pub module: String,
    #[serde(default)]
    pub surface: ExportSurface,
    pub fuel: Option<u64>,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> PluginResult<HostConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a config from YAML text
pub fn parse_config(content: &str) -> PluginResult<HostConfig> {
    serde_yaml::from_str(content).map_err(|e| PluginError::Config(e.to_string()))
}

/// Load a config from a YAML file and check it for consistency
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> PluginResult<HostConfig> {
    let cfg = load_config(path)?;

    if let Err(validation_errors) = crate::config::validate_config(&cfg) {
        let error_messages: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();
        return Err(PluginError::Config(format!(
            "Configuration validation failed:\n{}",
            error_messages.join("\n")
        )));
    }

    Ok(cfg)
}
