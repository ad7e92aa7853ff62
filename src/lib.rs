// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // host configuration
pub mod observability; // log message types
pub mod pipeline;      // roles, lifecycle and sink interfaces
pub mod plugin;        // plugins, factories, wrappers
pub mod wasm;          // sandboxed module execution
