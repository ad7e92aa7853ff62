// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Go managed-runtime bridge shim
//!
//! Modules built with `GOOS=js GOARCH=wasm` import their runtime support from
//! the `gojs` namespace (`go` on older toolchains). Every function takes a
//! single stack pointer; arguments and results live at fixed offsets from it
//! in the guest's linear memory.
//!
//! The runtime hooks a headless host can honour are implemented here. Every
//! other function the module imports from the namespace (notably the
//! `syscall/js.*` family, which needs a JavaScript object model) is linked to
//! a stub that traps when called, so instantiation succeeds and the failure is
//! deterministic.

use crate::wasm::compiler::{ImportKind, ModuleImport, MEMORY_EXPORTS};
use crate::wasm::environment::HostState;
use crate::wasm::error::{PluginError, PluginResult};
use rand::RngCore;
use std::io::Write;
use std::ops::Range;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use wasmtime::{Caller, Linker, Memory};

const KNOWN_FUNCTIONS: [&str; 9] = [
    "runtime.wasmExit",
    "runtime.wasmWrite",
    "runtime.resetMemoryDataView",
    "runtime.nanotime1",
    "runtime.walltime",
    "runtime.scheduleTimeoutEvent",
    "runtime.clearTimeoutEvent",
    "runtime.getRandomData",
    "debug",
];

/// Per-instance state of the Go bridge.
pub struct GoBridgeState {
    origin: Instant,
    next_timeout_id: i32,
    inherit_stdio: bool,
}

impl GoBridgeState {
    pub fn new(inherit_stdio: bool) -> Self {
        Self {
            origin: Instant::now(),
            next_timeout_id: 1,
            inherit_stdio,
        }
    }
}

/// Installs the bridge under `namespace`, plus trapping stubs for any other
/// function the module imports from it.
pub fn add_to_linker(
    linker: &mut Linker<HostState>,
    namespace: &'static str,
    imports: &[ModuleImport],
) -> PluginResult<()> {
    install_runtime(linker, namespace)
        .map_err(|e| PluginError::Environment(format!("failed to install Go bridge: {}", e)))?;

    for import in imports.iter().filter(|i| i.namespace == namespace) {
        if KNOWN_FUNCTIONS.contains(&import.name.as_str()) {
            continue;
        }
        if let ImportKind::Function(ty) = &import.kind {
            let qualified = import.qualified_name();
            linker
                .func_new(namespace, &import.name, ty.clone(), move |_, _, _| {
                    Err(wasmtime::Error::msg(format!(
                        "Go bridge does not support '{}'",
                        qualified
                    )))
                })
                .map_err(|e| {
                    PluginError::Environment(format!(
                        "failed to stub '{}': {}",
                        import.qualified_name(),
                        e
                    ))
                })?;
        }
    }

    Ok(())
}

fn install_runtime(linker: &mut Linker<HostState>, ns: &'static str) -> wasmtime::Result<()> {
    linker.func_wrap(ns, "runtime.wasmExit", |mut caller: Caller<'_, HostState>, sp: i32| {
        let code = read_u32(&mut caller, sp, 8)? as i32;
        Err::<(), _>(wasmtime_wasi::I32Exit(code).into())
    })?;

    linker.func_wrap(ns, "runtime.wasmWrite", |mut caller: Caller<'_, HostState>, sp: i32| {
        let fd = read_u64(&mut caller, sp, 8)?;
        let ptr = read_u64(&mut caller, sp, 16)?;
        let len = read_u32(&mut caller, sp, 24)? as u64;

        let memory = memory(&mut caller)?;
        let bytes = guest_slice(memory.data(&caller), ptr, len)?;
        if caller.data().go.inherit_stdio {
            match fd {
                2 => std::io::stderr().write_all(bytes)?,
                _ => std::io::stdout().write_all(bytes)?,
            }
        }
        Ok(())
    })?;

    linker.func_wrap(ns, "runtime.resetMemoryDataView", |_: Caller<'_, HostState>, _sp: i32| {})?;

    linker.func_wrap(ns, "runtime.nanotime1", |mut caller: Caller<'_, HostState>, sp: i32| {
        let nanos = caller.data().go.origin.elapsed().as_nanos() as u64;
        write_bytes(&mut caller, sp, 8, &nanos.to_le_bytes())
    })?;

    linker.func_wrap(ns, "runtime.walltime", |mut caller: Caller<'_, HostState>, sp: i32| {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        write_bytes(&mut caller, sp, 8, &now.as_secs().to_le_bytes())?;
        write_bytes(&mut caller, sp, 16, &now.subsec_nanos().to_le_bytes())
    })?;

    // Timers never fire in a headless host; the id keeps the runtime's
    // bookkeeping consistent.
    linker.func_wrap(
        ns,
        "runtime.scheduleTimeoutEvent",
        |mut caller: Caller<'_, HostState>, sp: i32| {
            let id = caller.data().go.next_timeout_id;
            caller.data_mut().go.next_timeout_id = id.wrapping_add(1);
            write_bytes(&mut caller, sp, 16, &id.to_le_bytes())
        },
    )?;

    linker.func_wrap(ns, "runtime.clearTimeoutEvent", |_: Caller<'_, HostState>, _sp: i32| {})?;

    linker.func_wrap(ns, "runtime.getRandomData", |mut caller: Caller<'_, HostState>, sp: i32| {
        let ptr = read_u64(&mut caller, sp, 8)?;
        let len = read_u64(&mut caller, sp, 16)?;

        let memory = memory(&mut caller)?;
        let range = guest_range(memory.data_size(&caller), ptr, len)?;
        let data = memory.data_mut(&mut caller);
        rand::thread_rng().fill_bytes(&mut data[range]);
        Ok(())
    })?;

    linker.func_wrap(ns, "debug", |_: Caller<'_, HostState>, value: i32| {
        tracing::debug!("Go guest debug: {}", value);
    })?;

    Ok(())
}

fn memory(caller: &mut Caller<'_, HostState>) -> wasmtime::Result<Memory> {
    MEMORY_EXPORTS
        .iter()
        .find_map(|name| caller.get_export(name).and_then(|e| e.into_memory()))
        .ok_or_else(|| wasmtime::Error::msg("Go bridge: guest exports no linear memory"))
}

/// Validates a guest-supplied `ptr..ptr+len` against the memory size.
fn guest_range(memory_size: usize, ptr: u64, len: u64) -> wasmtime::Result<Range<usize>> {
    ptr.checked_add(len)
        .filter(|end| *end <= memory_size as u64)
        .map(|end| ptr as usize..end as usize)
        .ok_or_else(|| {
            wasmtime::Error::msg(format!(
                "Go bridge: region {}+{} is outside linear memory ({} bytes)",
                ptr, len, memory_size
            ))
        })
}

fn guest_slice(data: &[u8], ptr: u64, len: u64) -> wasmtime::Result<&[u8]> {
    let range = guest_range(data.len(), ptr, len)?;
    Ok(&data[range])
}

fn stack_addr(sp: i32, offset: usize) -> usize {
    sp as u32 as usize + offset
}

fn read_u64(caller: &mut Caller<'_, HostState>, sp: i32, offset: usize) -> wasmtime::Result<u64> {
    let mut buf = [0u8; 8];
    memory(caller)?.read(&*caller, stack_addr(sp, offset), &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32(caller: &mut Caller<'_, HostState>, sp: i32, offset: usize) -> wasmtime::Result<u32> {
    let mut buf = [0u8; 4];
    memory(caller)?.read(&*caller, stack_addr(sp, offset), &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_bytes(
    caller: &mut Caller<'_, HostState>,
    sp: i32,
    offset: usize,
    bytes: &[u8],
) -> wasmtime::Result<()> {
    memory(caller)?.write(&mut *caller, stack_addr(sp, offset), bytes)?;
    Ok(())
}
