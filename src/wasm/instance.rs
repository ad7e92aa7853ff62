// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Instance management
//!
//! An `InstanceManager` is built once per plugin from its compiled module and
//! guest environment. It links the environment into an `InstancePre` up front
//! so every later instantiation is a cheap, import-free operation on a brand
//! new `Store`.
//!
//! A `PluginInstance` lives for one logical operation (a metadata probe, a
//! config probe, or a start/stop pair) and is torn down when dropped.

use crate::observability::messages::instance::{InstanceCreated, InstanceDestroyed, InstanceInitialized};
use crate::wasm::abi;
use crate::wasm::compiler::{CompiledModule, COMMAND_START_EXPORT, FREE_EXPORT, INITIALIZE_EXPORT};
use crate::wasm::environment::{GuestEnvironment, HostState};
use crate::wasm::error::{PluginError, PluginResult};
use std::sync::atomic::{AtomicU64, Ordering};
use wasmtime::{Engine, Instance, InstancePre, Memory, Store, TypedFunc};

/// Resource bounds applied to every store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLimits {
    /// Fuel budget restored before every guest call.
    pub fuel: u64,
    /// Upper bound on linear memory growth.
    pub max_memory_bytes: usize,
}

pub struct InstanceManager {
    engine: Engine,
    pre: InstancePre<HostState>,
    environment: GuestEnvironment,
    memory_export: &'static str,
    has_free: bool,
    init_export: Option<&'static str>,
    source: String,
    limits: InstanceLimits,
    next_id: AtomicU64,
}

impl InstanceManager {
    /// Links the environment for `compiled`.
    ///
    /// # Errors
    /// `PluginError::Environment` if the module's imports cannot be resolved.
    pub fn new(
        engine: &Engine,
        compiled: &CompiledModule,
        environment: GuestEnvironment,
        limits: InstanceLimits,
    ) -> PluginResult<Self> {
        let pre = environment.link(engine, compiled)?;

        let init_export = [INITIALIZE_EXPORT, COMMAND_START_EXPORT]
            .into_iter()
            .find(|name| compiled.has_export(name));

        Ok(Self {
            engine: engine.clone(),
            pre,
            environment,
            memory_export: compiled.memory_export(),
            has_free: compiled.has_export(FREE_EXPORT),
            init_export,
            source: compiled.source().to_string(),
            limits,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn environment(&self) -> &GuestEnvironment {
        &self.environment
    }

    pub fn limits(&self) -> InstanceLimits {
        self.limits
    }

    /// Creates a fresh instance with its own store, fuel budget and memory.
    ///
    /// `config`, when given, is exposed to the guest as JSON through the
    /// `PLUGIN_CONFIG` environment variable. `_initialize` (or `_start`) runs
    /// before this returns; a clean exit from it counts as success.
    pub fn instantiate(&self, config: Option<&serde_json::Value>) -> PluginResult<PluginInstance> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let config_json = config
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PluginError::Instantiation(format!("unserializable config: {}", e)))?;

        let state = self
            .environment
            .host_state(config_json.as_deref(), self.limits.max_memory_bytes);
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(self.limits.fuel)
            .map_err(|e| PluginError::Engine(e.to_string()))?;

        let instance = self
            .pre
            .instantiate(&mut store)
            .map_err(|e| PluginError::Instantiation(format!("{:#}", e)))?;

        let memory = instance
            .get_memory(&mut store, self.memory_export)
            .ok_or_else(|| PluginError::MissingExport(self.memory_export.to_string()))?;

        let free = if self.has_free {
            Some(
                instance
                    .get_typed_func::<u32, ()>(&mut store, FREE_EXPORT)
                    .map_err(|e| PluginError::Instantiation(format!("{:#}", e)))?,
            )
        } else {
            None
        };

        let mut plugin_instance = PluginInstance {
            id,
            store,
            instance,
            memory,
            free,
            fuel: self.limits.fuel,
            poisoned: None,
            source: self.source.clone(),
        };

        tracing::debug!(
            "{}",
            InstanceCreated {
                instance_id: id,
                module_path: &self.source,
                fuel: self.limits.fuel,
            }
        );

        if let Some(export) = self.init_export {
            plugin_instance.initialize(export)?;
        }

        Ok(plugin_instance)
    }
}

/// A live instance: store, instance handle and linear memory.
pub struct PluginInstance {
    id: u64,
    pub(crate) store: Store<HostState>,
    pub(crate) instance: Instance,
    pub(crate) memory: Memory,
    pub(crate) free: Option<TypedFunc<u32, ()>>,
    fuel: u64,
    poisoned: Option<String>,
    source: String,
}

impl PluginInstance {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Current size of linear memory in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Fails with `InstancePoisoned` once the instance has been marked unusable.
    pub fn ensure_usable(&self) -> PluginResult<()> {
        match &self.poisoned {
            Some(reason) => Err(PluginError::InstancePoisoned(reason.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn poison(&mut self, reason: String) {
        self.poisoned.get_or_insert(reason);
    }

    /// Restores the full fuel budget ahead of a guest call.
    pub(crate) fn refuel(&mut self) -> PluginResult<()> {
        self.store
            .set_fuel(self.fuel)
            .map_err(|e| PluginError::Engine(e.to_string()))
    }

    /// Fuel consumed since the last refuel.
    pub(crate) fn fuel_consumed(&self) -> u64 {
        self.fuel
            .saturating_sub(self.store.get_fuel().unwrap_or(self.fuel))
    }

    /// Tears the instance down. Equivalent to dropping it.
    pub fn destroy(self) {}

    fn initialize(&mut self, export: &'static str) -> PluginResult<()> {
        self.refuel()?;
        let func = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, export)
            .map_err(|e| PluginError::Instantiation(format!("{:#}", e)))?;

        match func.call(&mut self.store, ()) {
            Ok(()) => {}
            Err(e) if abi::is_clean_exit(&e) => {}
            Err(e) => return Err(abi::guest_trap(export, e)),
        }

        tracing::debug!(
            "{}",
            InstanceInitialized {
                instance_id: self.id,
                export,
            }
        );
        Ok(())
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        tracing::debug!(
            "{}",
            InstanceDestroyed {
                instance_id: self.id,
                module_path: &self.source,
            }
        );
    }
}
