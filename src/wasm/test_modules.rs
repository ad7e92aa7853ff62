// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only builder for guest modules written in WAT.
//!
//! Every data export returns a packed `(offset << 32) | length` constant that
//! points at a data segment holding its JSON payload. `free` counts its calls
//! in the exported `free_count` global and records its argument in
//! `last_freed` so tests can check buffer release.

use crate::wasm::loader::ModuleImage;

/// First byte offset used for payload data segments.
const DATA_BASE: u32 = 1024;

pub const DEFAULT_METADATA: &str =
    r#"{"type":"test","status":{"stability":{"development":["logs"]}}}"#;

/// What a data export does when called.
pub enum Response {
    /// Return a packed pointer to this JSON text.
    Json(String),
    /// Return zero ("no payload").
    Empty,
    /// Return an arbitrary packed region without backing data.
    Region { offset: u32, length: u32 },
    /// Trap with `unreachable`.
    Trap,
    /// Raw WAT instructions producing an i64.
    Body(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FreeBehavior {
    Count,
    Trap,
    Absent,
}

pub struct GuestModule {
    functions: Vec<(String, String)>,
    segments: Vec<(u32, Vec<u8>)>,
    cursor: u32,
    imports: Vec<String>,
    items: Vec<String>,
    free: FreeBehavior,
}

impl GuestModule {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            segments: Vec::new(),
            cursor: DATA_BASE,
            imports: Vec::new(),
            items: Vec::new(),
            free: FreeBehavior::Count,
        }
    }

    /// A module that satisfies the full start/stop contract.
    pub fn lifecycle() -> Self {
        Self::new()
            .respond("metadata", Response::Json(DEFAULT_METADATA.to_string()))
            .respond("defaultConfig", Response::Json("{}".to_string()))
            .respond("start", Response::Empty)
            .respond("stop", Response::Empty)
    }

    /// A module that only describes itself and exports no `free`.
    pub fn discovery() -> Self {
        let mut module = Self::new()
            .respond("metadata", Response::Json(DEFAULT_METADATA.to_string()))
            .respond("defaultConfig", Response::Json("{}".to_string()));
        module.free = FreeBehavior::Absent;
        module
    }

    /// Mirrors a guest that runs a single global server: `start` fails with
    /// `already started` when its flag is set and `stop` fails with
    /// `not started` when it is clear.
    pub fn server(reset_on_stop: bool) -> Self {
        let mut module = Self::lifecycle();
        let already = module.place(br#"{"error":"already started"}"#);
        let not_started = module.place(br#"{"error":"not started"}"#);
        let reset = if reset_on_stop {
            "(global.set $started (i32.const 0))"
        } else {
            ""
        };

        module
            .with_item(r#"(global $started (export "started") (mut i32) (i32.const 0))"#)
            .respond(
                "start",
                Response::Body(format!(
                    "(if (result i64) (global.get $started) \
                     (then (i64.const {already})) \
                     (else (global.set $started (i32.const 1)) (i64.const 0)))"
                )),
            )
            .respond(
                "stop",
                Response::Body(format!(
                    "(if (result i64) (global.get $started) \
                     (then {reset} (i64.const 0)) \
                     (else (i64.const {not_started})))"
                )),
            )
    }

    pub fn respond(mut self, name: &str, response: Response) -> Self {
        let body = match response {
            Response::Json(text) => format!("(i64.const {})", self.place(text.as_bytes())),
            Response::Empty => "(i64.const 0)".to_string(),
            Response::Region { offset, length } => {
                format!("(i64.const {})", pack(offset, length))
            }
            Response::Trap => "(unreachable)".to_string(),
            Response::Body(body) => body,
        };
        self.functions.retain(|(existing, _)| existing != name);
        self.functions.push((name.to_string(), body));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        if name == "free" {
            self.free = FreeBehavior::Absent;
        }
        self.functions.retain(|(existing, _)| existing != name);
        self
    }

    pub fn trapping_free(mut self) -> Self {
        self.free = FreeBehavior::Trap;
        self
    }

    pub fn with_import(mut self, import: &str) -> Self {
        self.imports.push(import.to_string());
        self
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.items.push(item.to_string());
        self
    }

    /// Stores bytes in a data segment and returns the packed region.
    pub fn place(&mut self, bytes: &[u8]) -> i64 {
        let offset = self.cursor;
        self.segments.push((offset, bytes.to_vec()));
        self.cursor = (offset + bytes.len() as u32 + 7) & !7;
        pack(offset, bytes.len() as u32)
    }

    pub fn to_wat(&self) -> String {
        let mut wat = String::from("(module\n");
        for import in &self.imports {
            wat.push_str(&format!("  {}\n", import));
        }
        wat.push_str("  (memory (export \"memory\") 1)\n");
        wat.push_str("  (global $free_count (export \"free_count\") (mut i32) (i32.const 0))\n");
        wat.push_str("  (global $last_freed (export \"last_freed\") (mut i32) (i32.const 0))\n");
        for item in &self.items {
            wat.push_str(&format!("  {}\n", item));
        }
        for (name, body) in &self.functions {
            wat.push_str(&format!(
                "  (func (export \"{}\") (result i64) {})\n",
                name, body
            ));
        }
        match self.free {
            FreeBehavior::Count => wat.push_str(
                "  (func (export \"free\") (param $ptr i32)\n    \
                 (global.set $free_count (i32.add (global.get $free_count) (i32.const 1)))\n    \
                 (global.set $last_freed (local.get $ptr)))\n",
            ),
            FreeBehavior::Trap => {
                wat.push_str("  (func (export \"free\") (param $ptr i32) (unreachable))\n")
            }
            FreeBehavior::Absent => {}
        }
        for (offset, bytes) in &self.segments {
            wat.push_str(&format!("  (data (i32.const {}) \"{}\")\n", offset, escape(bytes)));
        }
        wat.push_str(")\n");
        wat
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        wat::parse_str(self.to_wat()).expect("fixture WAT should assemble")
    }

    pub fn to_image(&self) -> ModuleImage {
        ModuleImage::from_bytes(self.to_bytes(), "fixture.wasm")
    }
}

pub fn pack(offset: u32, length: u32) -> i64 {
    (((offset as u64) << 32) | length as u64) as i64
}

fn escape(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{:02x}", b)).collect()
}
