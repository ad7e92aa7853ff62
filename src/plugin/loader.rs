// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin construction
//!
//! Loading a plugin runs every load-time step exactly once:
//!
//! 1. read the module image
//! 2. compile it and validate the export surface
//! 3. select and link the guest environment
//! 4. probe `metadata` on a fresh instance
//! 5. probe `defaultConfig` on another fresh instance
//!
//! The resulting `Plugin` holds no live instance. It is read-only from here
//! on and can be shared between threads.

use crate::config::{merge_config, PluginConfig, WasmConfig};
use crate::observability::messages::plugin::PluginLoaded;
use crate::pipeline::Role;
use crate::plugin::metadata::PluginMetadata;
use crate::plugin::registry::{ComponentFactory, FactoryMap};
use crate::wasm::abi;
use crate::wasm::compiler::{
    compile, ExportSurface, COLLECT_EXPORT, DEFAULT_CONFIG_EXPORT, METADATA_EXPORT,
};
use crate::wasm::engine::create_engine;
use crate::wasm::environment::{GuestEnvironment, SocketPolicy};
use crate::wasm::error::{PluginError, PluginResult};
use crate::wasm::instance::{InstanceLimits, InstanceManager, PluginInstance};
use crate::wasm::loader::{load_module_image, ModuleImage};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use wasmtime::Engine;

/// Everything needed to build a plugin besides the module bytes.
#[derive(Debug, Clone)]
pub struct PluginOptions {
    pub role: Role,
    pub surface: ExportSurface,
    pub limits: InstanceLimits,
    pub sockets: SocketPolicy,
    pub inherit_stdio: bool,
}

/// A compiled, validated and described plugin module.
pub struct Plugin {
    role: Role,
    source: String,
    surface: ExportSurface,
    metadata: PluginMetadata,
    default_config: Value,
    has_collect: bool,
    /// First lifecycle export the module lacks, if any.
    missing_lifecycle_export: Option<&'static str>,
    instances: InstanceManager,
}

impl Plugin {
    /// Reads the module at `path` and builds a plugin from it.
    pub fn load<P: AsRef<Path>>(engine: &Engine, path: P, options: &PluginOptions) -> PluginResult<Self> {
        let image = load_module_image(path)?;
        Self::from_image(engine, &image, options)
    }

    pub fn from_image(engine: &Engine, image: &ModuleImage, options: &PluginOptions) -> PluginResult<Self> {
        let compiled = compile(engine, image, options.surface)?;
        let environment =
            GuestEnvironment::select(&compiled, &options.sockets, options.inherit_stdio);
        let instances = InstanceManager::new(engine, &compiled, environment, options.limits)?;

        let metadata = probe_metadata(&instances)?;
        let default_config = probe_default_config(&instances)?;

        let plugin = Self {
            role: options.role,
            source: compiled.source().to_string(),
            surface: options.surface,
            metadata,
            default_config,
            has_collect: compiled.has_export(COLLECT_EXPORT),
            missing_lifecycle_export: ExportSurface::Lifecycle
                .required_exports()
                .iter()
                .copied()
                .find(|name| !compiled.has_export(name)),
            instances,
        };

        tracing::info!(
            "{}",
            PluginLoaded {
                component_type: plugin.component_type(),
                module_path: &plugin.source,
                role: plugin.role.as_str(),
                surface: plugin.surface.as_str(),
            }
        );

        Ok(plugin)
    }

    pub fn component_type(&self) -> &str {
        &self.metadata.component_type
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn surface(&self) -> ExportSurface {
        self.surface
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn default_config(&self) -> &Value {
        &self.default_config
    }

    /// Whether the module exports `collect`.
    pub fn has_collect(&self) -> bool {
        self.has_collect
    }

    /// Fails with `MissingExport` unless the module carries the full
    /// start/stop contract. Checked before any instance is created for a
    /// start, so discovery-only modules never run guest code for one.
    pub fn ensure_startable(&self) -> PluginResult<()> {
        match self.missing_lifecycle_export {
            Some(name) => Err(PluginError::MissingExport(name.to_string())),
            None => Ok(()),
        }
    }

    /// Default configuration with `overrides` shallow-merged on top.
    pub fn effective_config(&self, overrides: &Value) -> Value {
        merge_config(&self.default_config, overrides)
    }

    pub fn instantiate(&self, config: Option<&Value>) -> PluginResult<PluginInstance> {
        self.instances.instantiate(config)
    }
}

fn probe_metadata(instances: &InstanceManager) -> PluginResult<PluginMetadata> {
    let mut probe = instances.instantiate(None)?;
    let bytes = abi::call(&mut probe, METADATA_EXPORT)?;
    probe.destroy();

    if bytes.is_empty() {
        return Err(PluginError::InvalidMetadata(
            "metadata export returned no payload".to_string(),
        ));
    }
    PluginMetadata::from_json(&bytes)
}

fn probe_default_config(instances: &InstanceManager) -> PluginResult<Value> {
    let mut probe = instances.instantiate(None)?;
    let config = abi::call_json::<Value>(&mut probe, DEFAULT_CONFIG_EXPORT)?;
    probe.destroy();

    Ok(config.unwrap_or_else(|| Value::Object(Default::default())))
}

/// Builds plugins from host configuration on one shared engine.
pub struct PluginLoader {
    engine: Engine,
    wasm: WasmConfig,
}

impl PluginLoader {
    pub fn new(wasm: WasmConfig) -> PluginResult<Self> {
        Ok(Self {
            engine: create_engine()?,
            wasm,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn options_for(&self, config: &PluginConfig) -> PluginOptions {
        PluginOptions {
            role: config.role,
            surface: config.surface,
            limits: InstanceLimits {
                fuel: self.wasm.fuel.resolve(config.fuel),
                max_memory_bytes: self.wasm.memory.max_bytes,
            },
            sockets: self.wasm.sockets.clone(),
            inherit_stdio: self.wasm.inherit_stdio,
        }
    }

    pub fn load(&self, config: &PluginConfig) -> PluginResult<Arc<Plugin>> {
        let options = self.options_for(config);
        Plugin::load(&self.engine, &config.module, &options).map(Arc::new)
    }

    pub fn build_factory(&self, config: &PluginConfig) -> PluginResult<ComponentFactory> {
        self.load(config).map(ComponentFactory::new)
    }

    /// Loads every configured plugin. The first failure aborts the whole load.
    pub fn load_all(&self, configs: &[PluginConfig]) -> PluginResult<FactoryMap> {
        let factories = configs
            .iter()
            .map(|config| self.build_factory(config))
            .collect::<PluginResult<Vec<_>>>()?;
        FactoryMap::new(factories)
    }
}
