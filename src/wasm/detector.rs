// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WASM binary encoding detection
//!
//! Uses wasmparser to tell classic core modules apart from Component Model
//! binaries before the image reaches the compiler. The plugin ABI is defined
//! over core-module exports, so anything else is rejected as a load error.

use crate::wasm::error::{
    PluginError, PluginResult, WASM_COMPONENT_NOT_SUPPORTED, WASM_UNSUPPORTED_ENCODING,
};

use wasmparser::{Encoding, Parser, Payload};

/// Binary encodings the detector can recognise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WasmEncoding {
    /// Classic core WASM module (version 1, no component section)
    CoreModule,
    /// Component Model binary (version 2+)
    Component,
    /// Legacy Preview 1 component (version 1 + "component" custom section)
    LegacyComponent,
}

/// Detects the encoding of a WebAssembly binary by inspecting its version
/// header and (for version 1) custom sections.
///
/// # Errors
/// Returns `PluginError::Load` if the input is empty, truncated, or otherwise
/// not a well-formed WebAssembly binary.
pub fn detect_encoding(bytes: &[u8]) -> PluginResult<WasmEncoding> {
    let parser = Parser::new(0);
    let mut encoding = None;
    let mut has_component_section = false;

    for payload in parser.parse_all(bytes) {
        let payload = payload.map_err(|e| PluginError::Load(format!("invalid WASM binary: {}", e)))?;
        match payload {
            Payload::Version { encoding: enc, .. } => {
                encoding = Some(enc);
            }
            Payload::CustomSection(reader) if reader.name() == "component" => {
                has_component_section = true;
            }
            _ => {}
        }
    }

    let encoding =
        encoding.ok_or_else(|| PluginError::Load("invalid WASM binary: no header".to_string()))?;

    Ok(match encoding {
        Encoding::Component => WasmEncoding::Component,
        Encoding::Module if has_component_section => WasmEncoding::LegacyComponent,
        Encoding::Module => WasmEncoding::CoreModule,
    })
}

/// Accepts only core modules, rejecting every other encoding with a load error.
pub fn ensure_core_module(bytes: &[u8]) -> PluginResult<()> {
    match detect_encoding(bytes)? {
        WasmEncoding::CoreModule => Ok(()),
        WasmEncoding::Component => Err(PluginError::Load(WASM_COMPONENT_NOT_SUPPORTED.to_string())),
        WasmEncoding::LegacyComponent => {
            Err(PluginError::Load(WASM_UNSUPPORTED_ENCODING.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(matches!(detect_encoding(&[]), Err(PluginError::Load(_))));
    }

    #[test]
    fn test_invalid_input() {
        let bad = b"\x00\x00\x00\x00\x00\x00\x00\x00";
        assert!(matches!(detect_encoding(bad), Err(PluginError::Load(_))));
    }

    #[test]
    fn test_core_module_detected() {
        let bytes = wat::parse_str("(module (memory (export \"memory\") 1))").unwrap();
        assert_eq!(detect_encoding(&bytes).unwrap(), WasmEncoding::CoreModule);
        assert!(ensure_core_module(&bytes).is_ok());
    }

    #[test]
    fn test_component_rejected() {
        let bytes = wat::parse_str("(component)").unwrap();
        assert_eq!(detect_encoding(&bytes).unwrap(), WasmEncoding::Component);

        match ensure_core_module(&bytes) {
            Err(PluginError::Load(msg)) => assert!(msg.contains("Component Model")),
            other => panic!("Expected Load error, got {:?}", other),
        }
    }
}
