// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading and validation.

use std::fmt::{Display, Formatter};

/// Host configuration loaded and validated.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasi_plugin_host::observability::messages::validation::ConfigLoaded;
///
/// let msg = ConfigLoaded {
///     config_path: "host.yaml",
///     plugin_count: 3,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ConfigLoaded<'a> {
    pub config_path: &'a str,
    pub plugin_count: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded configuration {} ({} plugin(s))",
            self.config_path, self.plugin_count
        )
    }
}

/// A requested fuel budget fell outside the configured bounds.
///
/// # Log Level
/// `warn!` - Configuration is not applied as written
pub struct FuelLevelClamped {
    pub requested: u64,
    pub applied: u64,
}

impl Display for FuelLevelClamped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Requested fuel budget {} is out of bounds, using {}",
            self.requested, self.applied
        )
    }
}
