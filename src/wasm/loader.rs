// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module image loading
//!
//! Reads plugin binaries from disk and performs size validation. It does not
//! parse the binary format - that's the responsibility of the detector and
//! compiler modules.

use crate::observability::messages::plugin::{ModuleLoadFailed, ModuleLoaded};
use crate::wasm::error::{PluginError, PluginResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum allowed size for plugin binaries (16 MB)
pub const MAX_WASM_SIZE: usize = 16 * 1024 * 1024;

/// Immutable module bytes together with where they came from.
#[derive(Debug, Clone)]
pub struct ModuleImage {
    bytes: Arc<[u8]>,
    source: PathBuf,
}

impl ModuleImage {
    /// Wraps in-memory bytes, e.g. an image supplied by an embedder.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, source: impl Into<PathBuf>) -> Self {
        Self {
            bytes: bytes.into(),
            source: source.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn source_display(&self) -> String {
        self.source.display().to_string()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Loads a module image from a file and validates its size
///
/// # Returns
/// * `Ok(ModuleImage)` - The module bytes tagged with their path
/// * `Err(PluginError::Io)` - If the file cannot be read
/// * `Err(PluginError::Load)` - If the file exceeds [`MAX_WASM_SIZE`]
pub fn load_module_image<P: AsRef<Path>>(path: P) -> PluginResult<ModuleImage> {
    let path = path.as_ref();
    let module_path = path.display().to_string();

    let bytes = std::fs::read(path).map_err(|e| {
        let error = PluginError::Io(e);
        tracing::error!(
            "{}",
            ModuleLoadFailed {
                module_path: &module_path,
                error: &error,
            }
        );
        error
    })?;

    if bytes.len() > MAX_WASM_SIZE {
        let error = PluginError::Load(format!(
            "WASM file too large: {} bytes (max: {} bytes)",
            bytes.len(),
            MAX_WASM_SIZE
        ));
        tracing::error!(
            "{}",
            ModuleLoadFailed {
                module_path: &module_path,
                error: &error,
            }
        );
        return Err(error);
    }

    tracing::info!(
        "{}",
        ModuleLoaded {
            module_path: &module_path,
            size_bytes: bytes.len(),
        }
    );

    Ok(ModuleImage::from_bytes(bytes, path))
}
