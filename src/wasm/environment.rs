// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest environment selection
//!
//! Decides which host shims a module needs by looking only at its import
//! table, then links exactly those shims into an `InstancePre` that every
//! later instantiation reuses.
//!
//! | Import namespace          | Shim installed                 |
//! |---------------------------|--------------------------------|
//! | `wasi_snapshot_preview1`  | WASI Preview 1 (wasmtime-wasi) |
//! | `gojs`, `go`              | Go managed-runtime bridge      |
//! | (always)                  | socket policy                  |
//!
//! Detection is per-namespace membership, so a TinyGo module importing both
//! WASI and a Go namespace gets both shims. Imports no shim claims are an
//! environment error at load time rather than an instantiation failure later.

use crate::observability::messages::plugin::EnvironmentSelected;
use crate::wasm::compiler::{CompiledModule, ImportKind, ModuleImport};
use crate::wasm::error::{PluginError, PluginResult};
use crate::wasm::go_bridge::{self, GoBridgeState};
use serde::Deserialize;
use wasmtime::{Engine, InstancePre, Linker, StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

pub const WASI_PREVIEW1_NAMESPACE: &str = "wasi_snapshot_preview1";
pub const GO_BRIDGE_NAMESPACES: [&str; 2] = ["gojs", "go"];

/// Environment variable carrying the effective plugin configuration as JSON.
pub const PLUGIN_CONFIG_ENV: &str = "PLUGIN_CONFIG";

/// The shims a module needs, derived purely from its import table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShimSet {
    pub wasi: bool,
    pub go_bridge: Vec<&'static str>,
    /// Qualified names of imports no shim provides.
    pub unclaimed: Vec<String>,
}

impl ShimSet {
    /// Names of the installed shims, for logging. Sockets are always present.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.wasi {
            names.push(WASI_PREVIEW1_NAMESPACE);
        }
        names.extend(self.go_bridge.iter().copied());
        names.push("sockets");
        names
    }
}

/// Classifies an import table into the shims it needs.
pub fn classify_imports(imports: &[ModuleImport]) -> ShimSet {
    let mut shims = ShimSet::default();

    for import in imports {
        let claimed = match &import.kind {
            ImportKind::Other(_) => false,
            ImportKind::Function(_) if import.namespace == WASI_PREVIEW1_NAMESPACE => {
                shims.wasi = true;
                true
            }
            ImportKind::Function(_) => {
                match GO_BRIDGE_NAMESPACES
                    .iter()
                    .find(|ns| **ns == import.namespace)
                {
                    Some(ns) => {
                        if !shims.go_bridge.contains(ns) {
                            shims.go_bridge.push(ns);
                        }
                        true
                    }
                    None => false,
                }
            }
        };

        if !claimed {
            shims.unclaimed.push(import.qualified_name());
        }
    }

    shims
}

/// Socket configuration handed to the guest. Everything is denied unless
/// enabled, so guests attempting network operations get deterministic errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SocketPolicy {
    #[serde(default)]
    pub allow_tcp: bool,
    #[serde(default)]
    pub allow_udp: bool,
    #[serde(default)]
    pub allow_ip_name_lookup: bool,
    /// Permit every address the host itself can reach.
    #[serde(default)]
    pub inherit_network: bool,
}

/// Per-store data: the shim contexts and resource limits of one instance.
pub struct HostState {
    pub(crate) wasi: WasiP1Ctx,
    pub(crate) go: GoBridgeState,
    pub(crate) limits: StoreLimits,
}

/// The shims selected for one compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestEnvironment {
    shims: ShimSet,
    sockets: SocketPolicy,
    inherit_stdio: bool,
}

impl GuestEnvironment {
    /// Selects the environment for a module. Pure: depends only on the
    /// module's cached import classification and the given policy.
    pub fn select(compiled: &CompiledModule, sockets: &SocketPolicy, inherit_stdio: bool) -> Self {
        let environment = Self {
            shims: compiled.shims().clone(),
            sockets: sockets.clone(),
            inherit_stdio,
        };

        tracing::info!(
            "{}",
            EnvironmentSelected {
                module_path: compiled.source(),
                shims: &environment.shims.names(),
            }
        );

        environment
    }

    pub fn shims(&self) -> &ShimSet {
        &self.shims
    }

    pub fn sockets(&self) -> &SocketPolicy {
        &self.sockets
    }

    /// Installs the selected shims and resolves every import once.
    ///
    /// # Errors
    /// `PluginError::Environment` if an import is unclaimed, a shim cannot be
    /// installed, or an import does not match the shim's definition.
    pub fn link(
        &self,
        engine: &Engine,
        compiled: &CompiledModule,
    ) -> PluginResult<InstancePre<HostState>> {
        if let Some(unclaimed) = self.shims.unclaimed.first() {
            return Err(PluginError::Environment(format!(
                "no shim provides import '{}' ({} unresolved)",
                unclaimed,
                self.shims.unclaimed.len()
            )));
        }

        let mut linker: Linker<HostState> = Linker::new(engine);

        if self.shims.wasi {
            wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |state: &mut HostState| {
                &mut state.wasi
            })
            .map_err(|e| PluginError::Environment(format!("failed to install WASI shim: {}", e)))?;
        }

        for namespace in self.shims.go_bridge.iter().copied() {
            go_bridge::add_to_linker(&mut linker, namespace, compiled.imports())?;
        }

        linker
            .instantiate_pre(compiled.module())
            .map_err(|e| PluginError::Environment(format!("failed to resolve imports: {:#}", e)))
    }

    /// Builds fresh store data for one instance.
    pub fn host_state(&self, config_json: Option<&str>, max_memory_bytes: usize) -> HostState {
        let mut builder = WasiCtxBuilder::new();
        if self.inherit_stdio {
            builder.inherit_stdio();
        }
        if let Some(config) = config_json {
            builder.env(PLUGIN_CONFIG_ENV, config);
        }

        builder
            .allow_tcp(self.sockets.allow_tcp)
            .allow_udp(self.sockets.allow_udp)
            .allow_ip_name_lookup(self.sockets.allow_ip_name_lookup);
        if self.sockets.inherit_network {
            builder.inherit_network();
        }

        HostState {
            wasi: builder.build_p1(),
            go: GoBridgeState::new(self.inherit_stdio),
            limits: StoreLimitsBuilder::new()
                .memory_size(max_memory_bytes)
                .build(),
        }
    }
}
