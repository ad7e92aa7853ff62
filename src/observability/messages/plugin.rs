// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for plugin loading events.
//!
//! This module contains message types for logging events related to:
//! * Module image loading and compilation
//! * Guest environment selection
//! * Metadata interpretation
//! * Factory construction

use std::fmt::{Display, Formatter};

/// Module image read from disk.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::plugin::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     module_path: "plugins/webhook.wasm",
///     size_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub module_path: &'a str,
    pub size_bytes: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded WASM module: {} ({} bytes)",
            self.module_path, self.size_bytes
        )
    }
}

/// Module image could not be read or was rejected.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ModuleLoadFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load WASM module '{}': {}",
            self.module_path, self.error
        )
    }
}

/// Shared Wasmtime engine created.
///
/// # Log Level
/// `debug!` - Setup detail
pub struct EngineCreated {
    pub fuel_metering: bool,
}

impl Display for EngineCreated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created WASM engine (fuel metering: {})",
            if self.fuel_metering { "on" } else { "off" }
        )
    }
}

/// Module compiled and its export surface validated.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::plugin::ModuleCompiled;
///
/// let msg = ModuleCompiled {
///     module_path: "plugins/webhook.wasm",
///     surface: "lifecycle",
///     import_count: 12,
///     export_count: 7,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleCompiled<'a> {
    pub module_path: &'a str,
    pub surface: &'a str,
    pub import_count: usize,
    pub export_count: usize,
}

impl Display for ModuleCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled module {} against {} surface ({} imports, {} exports)",
            self.module_path, self.surface, self.import_count, self.export_count
        )
    }
}

/// Module failed compilation or export validation.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ModuleCompileFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleCompileFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Module {} failed validation: {}",
            self.module_path, self.error
        )
    }
}

/// Host shims chosen from the module's imports.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::plugin::EnvironmentSelected;
///
/// let msg = EnvironmentSelected {
///     module_path: "plugins/go_receiver.wasm",
///     shims: &["wasi_snapshot_preview1", "gojs", "sockets"],
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct EnvironmentSelected<'a> {
    pub module_path: &'a str,
    pub shims: &'a [&'a str],
}

impl Display for EnvironmentSelected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Selected guest environment for {}: [{}]",
            self.module_path,
            self.shims.join(", ")
        )
    }
}

/// Plugin compiled, linked and described.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PluginLoaded<'a> {
    pub component_type: &'a str,
    pub module_path: &'a str,
    pub role: &'a str,
    pub surface: &'a str,
}

impl Display for PluginLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} plugin '{}' from {} ({} surface)",
            self.role, self.component_type, self.module_path, self.surface
        )
    }
}

/// Component factory ready for the pipeline.
///
/// # Log Level
/// `info!` - Important operational event
pub struct FactoryBuilt<'a> {
    pub component_type: &'a str,
    pub role: &'a str,
    pub registrations: &'a [String],
}

impl Display for FactoryBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.registrations.is_empty() {
            return write!(
                f,
                "Built {} factory '{}' with no capability registrations",
                self.role, self.component_type
            );
        }
        write!(
            f,
            "Built {} factory '{}': {}",
            self.role,
            self.component_type,
            self.registrations.join(", ")
        )
    }
}

/// Metadata declared a stability level the host does not know.
///
/// # Log Level
/// `warn!` - The capabilities are registered as `undefined`
pub struct StabilityLevelUnrecognized<'a> {
    pub component_type: &'a str,
    pub label: &'a str,
}

impl Display for StabilityLevelUnrecognized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Plugin '{}' declares unknown stability level '{}', treating as undefined",
            self.component_type, self.label
        )
    }
}

/// Metadata declared a capability kind the host does not handle.
///
/// # Log Level
/// `debug!`
pub struct CapabilityKindDropped<'a> {
    pub component_type: &'a str,
    pub kind: &'a str,
}

impl Display for CapabilityKindDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring capability '{}' declared by plugin '{}'",
            self.kind, self.component_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_selected_lists_shims() {
        let msg = EnvironmentSelected {
            module_path: "a.wasm",
            shims: &["gojs", "sockets"],
        };
        assert_eq!(
            msg.to_string(),
            "Selected guest environment for a.wasm: [gojs, sockets]"
        );
    }

    #[test]
    fn test_factory_built_without_registrations() {
        let msg = FactoryBuilt {
            component_type: "quiet",
            role: "receiver",
            registrations: &[],
        };
        assert!(msg.to_string().contains("no capability registrations"));
    }
}
