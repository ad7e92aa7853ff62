// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for guest calls across the pointer+length boundary.

use std::fmt::{Display, Formatter};

/// Guest export returned successfully.
///
/// # Log Level
/// `debug!` - Per-call detail
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::abi::GuestCallCompleted;
///
/// let msg = GuestCallCompleted {
///     function: "metadata",
///     instance_id: 3,
///     payload_bytes: 118,
///     fuel_consumed: 4_210,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct GuestCallCompleted<'a> {
    pub function: &'a str,
    pub instance_id: u64,
    pub payload_bytes: usize,
    pub fuel_consumed: u64,
}

impl Display for GuestCallCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instance #{} '{}' returned {} bytes (fuel consumed: {})",
            self.instance_id, self.function, self.payload_bytes, self.fuel_consumed
        )
    }
}

/// Guest export failed: trap, bad region or missing export.
///
/// # Log Level
/// `warn!` - The caller decides how severe it is
pub struct GuestCallFailed<'a> {
    pub function: &'a str,
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for GuestCallFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Call to '{}' in {} failed: {}",
            self.function, self.module_path, self.error
        )
    }
}

/// Guest `free` failed; the instance is poisoned.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct FreeFailed<'a> {
    pub function: &'a str,
    pub offset: u32,
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for FreeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "free({}) after '{}' in {} failed, instance poisoned: {}",
            self.offset, self.function, self.module_path, self.error
        )
    }
}

/// Buffer not released because the module exports no `free`.
///
/// # Log Level
/// `warn!`
pub struct FreeSkipped<'a> {
    pub function: &'a str,
    pub module_path: &'a str,
}

impl Display for FreeSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} exports no 'free'; buffer from '{}' not released",
            self.module_path, self.function
        )
    }
}
