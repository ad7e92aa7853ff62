// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display`, so call sites log a struct rather
//! than a format string.
//!
//! # Organization
//!
//! * `plugin` - Module loading, compilation, environment selection, factories
//! * `instance` - Instance and wrapper lifecycle, record forwarding
//! * `abi` - Individual guest calls and buffer release
//! * `validation` - Configuration loading and validation
//!
//! # Usage Pattern
//!
//! ```rust
//! use wasi_plugin_host::observability::messages::instance::WrapperStopped;
//!
//! let msg = WrapperStopped {
//!     component_id: "webhook/logs",
//! };
//!
//! tracing::info!("{}", msg);
//! ```

pub mod abi;
pub mod instance;
pub mod plugin;
pub mod validation;
