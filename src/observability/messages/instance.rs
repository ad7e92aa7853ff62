// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for instance and wrapper lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Instance creation, initialization and teardown
//! * Wrapper start/stop/close transitions
//! * Records moving from guests into sinks

use std::fmt::{Display, Formatter};

/// Fresh instance created.
///
/// # Log Level
/// `debug!` - Happens for every probe and every start
pub struct InstanceCreated<'a> {
    pub instance_id: u64,
    pub module_path: &'a str,
    pub fuel: u64,
}

impl Display for InstanceCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created instance #{} of {} (fuel budget {})",
            self.instance_id, self.module_path, self.fuel
        )
    }
}

/// Guest initialization export ran.
///
/// # Log Level
/// `debug!`
pub struct InstanceInitialized<'a> {
    pub instance_id: u64,
    pub export: &'a str,
}

impl Display for InstanceInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Instance #{} initialized via '{}'", self.instance_id, self.export)
    }
}

/// Instance torn down.
///
/// # Log Level
/// `debug!`
pub struct InstanceDestroyed<'a> {
    pub instance_id: u64,
    pub module_path: &'a str,
}

impl Display for InstanceDestroyed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Destroyed instance #{} of {}",
            self.instance_id, self.module_path
        )
    }
}

/// Wrapper reached `Running`.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::instance::WrapperStarted;
///
/// let msg = WrapperStarted {
///     component_id: "webhook/logs",
///     component_type: "webhook",
///     kind: "logs",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct WrapperStarted<'a> {
    pub component_id: &'a str,
    pub component_type: &'a str,
    pub kind: &'a str,
}

impl Display for WrapperStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Started {} ({} {})",
            self.component_id, self.component_type, self.kind
        )
    }
}

/// `start` failed; the wrapper is back to `Idle`.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WrapperStartFailed<'a> {
    pub component_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for WrapperStartFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to start {}: {}", self.component_id, self.error)
    }
}

/// Wrapper returned to `Idle` after a clean stop.
///
/// # Log Level
/// `info!`
pub struct WrapperStopped<'a> {
    pub component_id: &'a str,
}

impl Display for WrapperStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stopped {}", self.component_id)
    }
}

/// Stop reported an error; the instance was destroyed anyway.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WrapperStopFailed<'a> {
    pub component_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for WrapperStopFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stop of {} failed (instance destroyed): {}",
            self.component_id, self.error
        )
    }
}

/// Wrapper closed for good.
///
/// # Log Level
/// `info!`
pub struct WrapperClosed<'a> {
    pub component_id: &'a str,
}

impl Display for WrapperClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Closed {}", self.component_id)
    }
}

/// Collected records handed to the sink.
///
/// # Log Level
/// `debug!`
pub struct RecordsForwarded<'a> {
    pub component_id: &'a str,
    pub count: usize,
}

impl Display for RecordsForwarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Forwarded {} record(s) from {}",
            self.count, self.component_id
        )
    }
}

/// Collected records discarded because the component has no sink.
///
/// # Log Level
/// `warn!`
pub struct RecordsDropped<'a> {
    pub component_id: &'a str,
    pub count: usize,
}

impl Display for RecordsDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropped {} record(s) from {}: component has no sink",
            self.count, self.component_id
        )
    }
}

/// One record written by the logging sink.
///
/// # Log Level
/// `info!`
pub struct RecordsSunk<'a> {
    pub kind: &'a str,
    pub record: &'a serde_json::Value,
}

impl Display for RecordsSunk<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.record)
    }
}
