// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module compilation and export-surface validation
//!
//! Compiles a module image into a `wasmtime::Module` and checks the plugin
//! export contract before any guest code can run:
//!
//! ```text
//! metadata()      -> i64     discovery + lifecycle
//! defaultConfig() -> i64     discovery + lifecycle
//! start()         -> i64     lifecycle
//! stop()          -> i64     lifecycle
//! free(i32)                  lifecycle
//! collect()       -> i64     optional
//! _initialize() / _start()   optional
//! ```
//!
//! The import table is captured here and classified once into the shim set
//! the guest environment will need.

use crate::observability::messages::plugin::{ModuleCompileFailed, ModuleCompiled};
use crate::wasm::detector::ensure_core_module;
use crate::wasm::environment::{classify_imports, ShimSet};
use crate::wasm::error::{PluginError, PluginResult};
use crate::wasm::loader::ModuleImage;
use serde::Deserialize;
use std::collections::HashMap;
use wasmtime::{Engine, ExternType, FuncType, Module, ValType};

pub const METADATA_EXPORT: &str = "metadata";
pub const DEFAULT_CONFIG_EXPORT: &str = "defaultConfig";
pub const START_EXPORT: &str = "start";
pub const STOP_EXPORT: &str = "stop";
pub const FREE_EXPORT: &str = "free";
pub const COLLECT_EXPORT: &str = "collect";
pub const INITIALIZE_EXPORT: &str = "_initialize";
pub const COMMAND_START_EXPORT: &str = "_start";

/// Linear memory export names, in lookup order. Go emits `mem`.
pub const MEMORY_EXPORTS: [&str; 2] = ["memory", "mem"];

const DATA_EXPORT_SIGNATURE: &str = "() -> i64";
const FREE_EXPORT_SIGNATURE: &str = "(i32) -> ()";
const INIT_EXPORT_SIGNATURE: &str = "() -> ()";

/// The export contract a module is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportSurface {
    /// Metadata and default config only; enough to describe a plugin.
    Discovery,
    /// The full start/stop contract.
    #[default]
    Lifecycle,
}

impl ExportSurface {
    /// Required function exports, in the order they are checked.
    pub fn required_exports(self) -> &'static [&'static str] {
        match self {
            Self::Discovery => &[METADATA_EXPORT, DEFAULT_CONFIG_EXPORT],
            Self::Lifecycle => &[
                METADATA_EXPORT,
                DEFAULT_CONFIG_EXPORT,
                START_EXPORT,
                STOP_EXPORT,
                FREE_EXPORT,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Lifecycle => "lifecycle",
        }
    }
}

/// One entry of the module's import table.
#[derive(Debug, Clone)]
pub struct ModuleImport {
    pub namespace: String,
    pub name: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone)]
pub enum ImportKind {
    Function(FuncType),
    /// Memory, table, global or tag imports; no shim provides these.
    Other(&'static str),
}

impl ModuleImport {
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }
}

/// A validated, compiled plugin module.
///
/// Compiled once per plugin and instantiated many times. Everything here is
/// read-only after compilation.
pub struct CompiledModule {
    module: Module,
    source: String,
    surface: ExportSurface,
    imports: Vec<ModuleImport>,
    exports: Vec<String>,
    memory_export: &'static str,
    shims: ShimSet,
}

impl CompiledModule {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn surface(&self) -> ExportSurface {
        self.surface
    }

    pub fn imports(&self) -> &[ModuleImport] {
        &self.imports
    }

    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }

    /// Name of the linear memory export the ABI reads from.
    pub fn memory_export(&self) -> &'static str {
        self.memory_export
    }

    /// Shim classification of the import table, computed at compile time.
    pub fn shims(&self) -> &ShimSet {
        &self.shims
    }
}

/// Compiles and validates a module image against an export surface.
///
/// # Errors
/// * `Load` - the image is not a valid core module
/// * `MissingExport` - names the first missing required export, or `memory`
/// * `ExportSignature` - a contract export has the wrong type
pub fn compile(
    engine: &Engine,
    image: &ModuleImage,
    surface: ExportSurface,
) -> PluginResult<CompiledModule> {
    let source = image.source_display();
    compile_inner(engine, image, surface, &source).map_err(|error| {
        tracing::error!(
            "{}",
            ModuleCompileFailed {
                module_path: &source,
                error: &error,
            }
        );
        error
    })
}

fn compile_inner(
    engine: &Engine,
    image: &ModuleImage,
    surface: ExportSurface,
    source: &str,
) -> PluginResult<CompiledModule> {
    ensure_core_module(image.bytes())?;

    let module =
        Module::new(engine, image.bytes()).map_err(|e| PluginError::Load(format!("{:#}", e)))?;

    let exports: HashMap<String, ExternType> = module
        .exports()
        .map(|e| (e.name().to_string(), e.ty()))
        .collect();

    validate_exports(&exports, surface)?;
    let memory_export = find_memory_export(&exports)?;

    let imports = parse_imports(&module);
    let shims = classify_imports(&imports);

    tracing::info!(
        "{}",
        ModuleCompiled {
            module_path: source,
            surface: surface.as_str(),
            import_count: imports.len(),
            export_count: exports.len(),
        }
    );

    let mut export_names: Vec<String> = exports.into_keys().collect();
    export_names.sort();

    Ok(CompiledModule {
        module,
        source: source.to_string(),
        surface,
        imports,
        exports: export_names,
        memory_export,
        shims,
    })
}

fn validate_exports(exports: &HashMap<String, ExternType>, surface: ExportSurface) -> PluginResult<()> {
    if let Some(missing) = surface
        .required_exports()
        .iter()
        .find(|name| !matches!(exports.get(**name), Some(ExternType::Func(_))))
    {
        return Err(PluginError::MissingExport(missing.to_string()));
    }

    let data_exports = [
        METADATA_EXPORT,
        DEFAULT_CONFIG_EXPORT,
        START_EXPORT,
        STOP_EXPORT,
        COLLECT_EXPORT,
    ];
    for name in data_exports {
        check_signature(exports, name, DATA_EXPORT_SIGNATURE, is_data_export)?;
    }
    check_signature(exports, FREE_EXPORT, FREE_EXPORT_SIGNATURE, is_free_export)?;
    for name in [INITIALIZE_EXPORT, COMMAND_START_EXPORT] {
        check_signature(exports, name, INIT_EXPORT_SIGNATURE, is_init_export)?;
    }

    Ok(())
}

/// Checks the signature of an export if it is present.
fn check_signature(
    exports: &HashMap<String, ExternType>,
    name: &str,
    expected: &'static str,
    accepts: fn(&FuncType) -> bool,
) -> PluginResult<()> {
    match exports.get(name) {
        None => Ok(()),
        Some(ExternType::Func(ty)) if accepts(ty) => Ok(()),
        Some(_) => Err(PluginError::ExportSignature {
            name: name.to_string(),
            expected,
        }),
    }
}

fn is_data_export(ty: &FuncType) -> bool {
    let results: Vec<ValType> = ty.results().collect();
    ty.params().len() == 0 && matches!(results.as_slice(), [ValType::I64])
}

fn is_free_export(ty: &FuncType) -> bool {
    let params: Vec<ValType> = ty.params().collect();
    matches!(params.as_slice(), [ValType::I32]) && ty.results().len() == 0
}

fn is_init_export(ty: &FuncType) -> bool {
    ty.params().len() == 0 && ty.results().len() == 0
}

fn find_memory_export(exports: &HashMap<String, ExternType>) -> PluginResult<&'static str> {
    MEMORY_EXPORTS
        .iter()
        .copied()
        .find(|name| matches!(exports.get(*name), Some(ExternType::Memory(_))))
        .ok_or_else(|| PluginError::MissingExport(MEMORY_EXPORTS[0].to_string()))
}

fn parse_imports(module: &Module) -> Vec<ModuleImport> {
    module
        .imports()
        .map(|import| {
            let kind = match import.ty() {
                ExternType::Func(ty) => ImportKind::Function(ty),
                ExternType::Memory(_) => ImportKind::Other("memory"),
                ExternType::Table(_) => ImportKind::Other("table"),
                ExternType::Global(_) => ImportKind::Other("global"),
                _ => ImportKind::Other("tag"),
            };
            ModuleImport {
                namespace: import.module().to_string(),
                name: import.name().to_string(),
                kind,
            }
        })
        .collect()
}
