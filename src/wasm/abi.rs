// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pointer+length call protocol
//!
//! Every data export takes no arguments and returns one 64-bit integer:
//!
//! ```text
//!  63            32 31             0
//! +----------------+----------------+
//! |     offset     |     length     |
//! +----------------+----------------+
//! ```
//!
//! A return of exactly zero means "no payload". Otherwise the host copies
//! `[offset, offset + length)` out of linear memory, then hands the buffer
//! back with `free(offset)`. Raw memory access does not leave this module.

use crate::observability::messages::abi::{FreeFailed, FreeSkipped, GuestCallCompleted, GuestCallFailed};
use crate::wasm::error::{PluginError, PluginResult};
use crate::wasm::instance::PluginInstance;
use serde::de::DeserializeOwned;
use wasmtime::Trap;

/// A response region in guest linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRegion {
    pub offset: u32,
    pub length: u32,
}

impl PackedRegion {
    /// Splits a packed return value. Zero means "no payload".
    pub fn unpack(raw: u64) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        Some(Self {
            offset: (raw >> 32) as u32,
            length: raw as u32,
        })
    }

    pub fn pack(self) -> u64 {
        ((self.offset as u64) << 32) | self.length as u64
    }
}

/// Calls a zero-argument data export and returns the bytes it points at.
///
/// An empty vector means the guest returned no payload.
///
/// # Errors
/// * `InstancePoisoned` - an earlier `free` on this instance failed
/// * `MissingExport` - the export does not exist on this module
/// * `GuestTrap` - the guest trapped, ran out of fuel, or exited
/// * `OutOfRange` - the region is not entirely inside linear memory
pub fn call(instance: &mut PluginInstance, function: &str) -> PluginResult<Vec<u8>> {
    instance.ensure_usable()?;

    let result = call_inner(instance, function);
    if let Err(error) = &result {
        tracing::warn!(
            "{}",
            GuestCallFailed {
                function,
                module_path: instance.source(),
                error,
            }
        );
    }
    result
}

/// Calls a data export and decodes its JSON payload.
///
/// Returns `Ok(None)` when the guest returned no payload.
pub fn call_json<T: DeserializeOwned>(
    instance: &mut PluginInstance,
    function: &str,
) -> PluginResult<Option<T>> {
    let bytes = call(instance, function)?;
    if bytes.is_empty() {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PluginError::Decode {
            function: function.to_string(),
            source,
        })
}

fn call_inner(instance: &mut PluginInstance, function: &str) -> PluginResult<Vec<u8>> {
    let func = instance
        .instance
        .get_typed_func::<(), u64>(&mut instance.store, function)
        .map_err(|_| PluginError::MissingExport(function.to_string()))?;

    instance.refuel()?;
    let raw = func
        .call(&mut instance.store, ())
        .map_err(|e| guest_trap(function, e))?;

    let Some(region) = PackedRegion::unpack(raw) else {
        log_completed(instance, function, 0);
        return Ok(Vec::new());
    };

    let bytes = read_region(instance, region)?;
    log_completed(instance, function, bytes.len());

    release(instance, function, region.offset);
    Ok(bytes)
}

fn read_region(instance: &PluginInstance, region: PackedRegion) -> PluginResult<Vec<u8>> {
    let data = instance.memory.data(&instance.store);
    let start = region.offset as usize;

    start
        .checked_add(region.length as usize)
        .and_then(|end| data.get(start..end))
        .map(<[u8]>::to_vec)
        .ok_or(PluginError::OutOfRange {
            offset: region.offset,
            length: region.length,
            memory_size: data.len(),
        })
}

/// Returns a buffer to the guest. Failure poisons the instance but does not
/// affect the result of the call that produced the buffer.
fn release(instance: &mut PluginInstance, function: &str, offset: u32) {
    let Some(free) = instance.free.clone() else {
        tracing::warn!(
            "{}",
            FreeSkipped {
                function,
                module_path: instance.source(),
            }
        );
        return;
    };

    let outcome = instance.refuel().and_then(|_| {
        free.call(&mut instance.store, offset)
            .map_err(|e| guest_trap("free", e))
    });

    if let Err(error) = outcome {
        tracing::error!(
            "{}",
            FreeFailed {
                function,
                offset,
                module_path: instance.source(),
                error: &error,
            }
        );
        instance.poison(format!("free({}) after '{}' failed: {}", offset, function, error));
    }
}

fn log_completed(instance: &PluginInstance, function: &str, payload_bytes: usize) {
    tracing::debug!(
        "{}",
        GuestCallCompleted {
            function,
            instance_id: instance.id(),
            payload_bytes,
            fuel_consumed: instance.fuel_consumed(),
        }
    );
}

/// Whether a guest error is a voluntary exit with status 0.
pub(crate) fn is_clean_exit(error: &wasmtime::Error) -> bool {
    matches!(error.downcast_ref::<wasmtime_wasi::I32Exit>(), Some(exit) if exit.0 == 0)
}

/// Maps a failed guest call to `GuestTrap`, naming fuel exhaustion and exits.
pub(crate) fn guest_trap(function: &str, error: wasmtime::Error) -> PluginError {
    let message = if let Some(exit) = error.downcast_ref::<wasmtime_wasi::I32Exit>() {
        format!("guest exited with status {}", exit.0)
    } else if let Some(trap) = error.downcast_ref::<Trap>() {
        match trap {
            Trap::OutOfFuel => "fuel budget exhausted".to_string(),
            other => other.to_string(),
        }
    } else {
        format!("{:#}", error)
    };

    PluginError::GuestTrap {
        function: function.to_string(),
        message,
    }
}
