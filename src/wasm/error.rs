// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the plugin host.
//!
//! Errors fall into two groups. Load-time errors (`Load`, `Io`, `MissingExport`,
//! `ExportSignature`, `Environment`, `Engine`, `InvalidMetadata`) abort plugin
//! construction entirely. Per-operation errors (`OutOfRange`, `Decode`,
//! `GuestTrap`, `Start`, `Stop`, `InstancePoisoned`) are scoped to a single
//! guest call or lifecycle transition and leave the loaded plugin usable.

use thiserror::Error;

/// Error message for component-model binaries handed to the core-module host.
pub const WASM_COMPONENT_NOT_SUPPORTED: &str =
    "Component Model binaries are not supported; plugins must be core WASM modules";

/// Error message for legacy Preview 1 component binaries.
pub const WASM_UNSUPPORTED_ENCODING: &str = "Unsupported WASM binary: Legacy Preview 1 Component Model detected. \
Please rebuild the plugin as a classic core WASM module.";

#[derive(Error, Debug)]
pub enum PluginError {
    /// The module image could not be read or parsed as a valid core module.
    #[error("Failed to load WASM module: {0}")]
    Load(String),

    /// File I/O error while reading the module image.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required export is absent from the module.
    #[error("Module is missing required export '{0}'")]
    MissingExport(String),

    /// A required export exists but does not match the ABI signature.
    #[error("Export '{name}' has an unexpected signature (expected {expected})")]
    ExportSignature {
        name: String,
        expected: &'static str,
    },

    /// A guest-environment shim could not be installed or an import is unresolvable.
    #[error("Guest environment error: {0}")]
    Environment(String),

    /// Wasmtime engine creation or configuration error.
    #[error("Engine creation error: {0}")]
    Engine(String),

    /// A fresh instance could not be created from the compiled module.
    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    /// The guest reported a response region outside its linear memory.
    #[error(
        "Response region out of range: offset={offset} length={length} memory_size={memory_size}"
    )]
    OutOfRange {
        offset: u32,
        length: u32,
        memory_size: usize,
    },

    /// The guest response could not be decoded into the expected shape.
    #[error("Failed to decode response from '{function}': {source}")]
    Decode {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// The guest trapped (panic, abort, fuel exhaustion, or exit) during a call.
    #[error("Guest trapped in '{function}': {message}")]
    GuestTrap { function: String, message: String },

    /// The guest reported a failure from its `start` export.
    #[error("Guest start failed: {0}")]
    Start(String),

    /// The guest reported a failure from its `stop` export.
    #[error("Guest stop failed: {0}")]
    Stop(String),

    /// A lifecycle operation overlapped another one on the same wrapper.
    #[error("Operation '{operation}' rejected while wrapper is {state}")]
    ConcurrentOperation {
        operation: &'static str,
        state: String,
    },

    /// The instance can no longer be used safely (for example `free` failed).
    #[error("Instance is no longer usable: {0}")]
    InstancePoisoned(String),

    /// The wrapper has been closed and accepts no further operations.
    #[error("Wrapper for '{0}' is closed")]
    WrapperClosed(String),

    /// The metadata payload violates the metadata invariants.
    #[error("Invalid plugin metadata: {0}")]
    InvalidMetadata(String),

    /// A component was requested for a capability the plugin does not declare.
    #[error("Component type '{component_type}' does not support {capability}")]
    UnsupportedCapability {
        component_type: String,
        capability: String,
    },

    /// The downstream sink rejected forwarded records.
    #[error("Sink rejected records: {0}")]
    Sink(String),

    /// Host configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type PluginResult<T> = Result<T, PluginError>;
