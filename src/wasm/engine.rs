// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wasmtime engine configuration
//!
//! A single engine is shared by every plugin a host loads. Modules compiled by
//! it are only valid with the same engine, so the plugin loader owns it.

use crate::observability::messages::plugin::EngineCreated;
use crate::wasm::error::{PluginError, PluginResult};
use wasmtime::{Config, Engine};

/// Creates a Wasmtime engine configured for sandboxed core-module plugins
///
/// - `consume_fuel(true)` - every store gets an execution-step budget
/// - `epoch_interruption(false)` - fuel is the only preemption mechanism
/// - Disabled features: threads, SIMD, multi-memory, memory64, component model
pub fn create_engine() -> PluginResult<Engine> {
    let mut config = Config::new();

    config.wasm_component_model(false);
    config.wasm_threads(false);
    config.wasm_simd(false);
    config.wasm_relaxed_simd(false);
    config.wasm_multi_memory(false);
    config.wasm_memory64(false);
    config.consume_fuel(true);
    config.epoch_interruption(false);

    let engine = Engine::new(&config).map_err(|e| PluginError::Engine(e.to_string()))?;
    tracing::debug!("{}", EngineCreated { fuel_metering: true });
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Module, Store};

    #[test]
    fn test_create_engine() {
        assert!(create_engine().is_ok());
    }

    #[test]
    fn test_engine_meters_fuel() {
        let engine = create_engine().unwrap();
        let mut store = Store::new(&engine, ());
        store.set_fuel(1_000).unwrap();
        assert_eq!(store.get_fuel().unwrap(), 1_000);
    }

    #[test]
    fn test_engine_rejects_simd() {
        let engine = create_engine().unwrap();
        let bytes = wat::parse_str(
            "(module (func (result v128) v128.const i64x2 0 0))",
        )
        .unwrap();
        assert!(Module::new(&engine, &bytes).is_err());
    }
}
