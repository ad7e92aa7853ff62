// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Sandboxed execution of plugin modules.
//!
//! The pipeline from bytes to a callable instance:
//!
//! ```text
//! loader ──► detector ──► compiler ──► environment ──► instance ──► abi
//!  (bytes)   (encoding)   (exports)    (shims, link)   (store)     (calls)
//! ```
//!
//! * `loader` - reads and size-checks module images
//! * `detector` - rejects component-model binaries
//! * `engine` - Wasmtime engine with fuel metering
//! * `compiler` - compilation and export-surface validation
//! * `environment` / `go_bridge` - import-driven shim selection and linking
//! * `instance` - fresh stores per operation, resource limits, teardown
//! * `abi` - the packed pointer+length call protocol

pub mod abi;
pub mod compiler;
pub mod detector;
pub mod engine;
pub mod environment;
pub mod error;
pub mod go_bridge;
pub mod instance;
pub mod loader;

#[cfg(test)]
pub mod test_modules;

pub use abi::{call, call_json, PackedRegion};
pub use compiler::{compile, CompiledModule, ExportSurface};
pub use detector::{detect_encoding, WasmEncoding};
pub use engine::create_engine;
pub use environment::{GuestEnvironment, SocketPolicy};
pub use error::{PluginError, PluginResult};
pub use instance::{InstanceLimits, InstanceManager, PluginInstance};
pub use loader::{load_module_image, ModuleImage, MAX_WASM_SIZE};
