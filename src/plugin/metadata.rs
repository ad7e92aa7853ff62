// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin self-description returned by the `metadata` export.
//!
//! ```json
//! {
//!   "type": "test",
//!   "status": {
//!     "class": "receiver",
//!     "stability": { "development": ["logs"], "beta": ["traces", "metrics"] },
//!     "distributions": ["contrib"],
//!     "codeowners": { "active": ["someone"] }
//!   }
//! }
//! ```

use crate::observability::messages::plugin::{CapabilityKindDropped, StabilityLevelUnrecognized};
use crate::pipeline::CapabilityKind;
use crate::wasm::error::{PluginError, PluginResult};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginMetadata {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub status: PluginStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginStatus {
    #[serde(default)]
    pub class: String,
    /// Stability level label to the capability kinds declared at that level.
    #[serde(default)]
    pub stability: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub distributions: Vec<String>,
    #[serde(default)]
    pub codeowners: CodeOwners,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CodeOwners {
    #[serde(default)]
    pub active: Vec<String>,
}

/// Maturity of a capability, ordered from least to most confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StabilityLevel {
    Undefined,
    Unmaintained,
    Deprecated,
    Development,
    Alpha,
    Beta,
    Stable,
}

impl StabilityLevel {
    const ALL: [StabilityLevel; 7] = [
        Self::Undefined,
        Self::Unmaintained,
        Self::Deprecated,
        Self::Development,
        Self::Alpha,
        Self::Beta,
        Self::Stable,
    ];

    /// Parses a label, ignoring ASCII case. Returns `None` for unknown labels.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(label))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Unmaintained => "unmaintained",
            Self::Deprecated => "deprecated",
            Self::Development => "development",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Stable => "stable",
        }
    }
}

impl Display for StabilityLevel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PluginMetadata {
    /// Parses and validates a raw metadata payload.
    pub fn from_json(bytes: &[u8]) -> PluginResult<Self> {
        let metadata: Self =
            serde_json::from_slice(bytes).map_err(|source| PluginError::Decode {
                function: crate::wasm::compiler::METADATA_EXPORT.to_string(),
                source,
            })?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> PluginResult<()> {
        if self.component_type.trim().is_empty() {
            return Err(PluginError::InvalidMetadata(
                "'type' must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }

    /// Distinct `(kind, level)` pairs declared in the stability table.
    ///
    /// Unknown levels become `Undefined`; unknown kinds are dropped.
    pub fn capabilities(&self) -> BTreeSet<(CapabilityKind, StabilityLevel)> {
        let mut table = BTreeSet::new();

        for (label, kinds) in &self.status.stability {
            let level = StabilityLevel::parse(label).unwrap_or_else(|| {
                tracing::warn!(
                    "{}",
                    StabilityLevelUnrecognized {
                        component_type: &self.component_type,
                        label,
                    }
                );
                StabilityLevel::Undefined
            });

            for kind in kinds {
                match CapabilityKind::parse(kind) {
                    Some(kind) => {
                        table.insert((kind, level));
                    }
                    None => tracing::debug!(
                        "{}",
                        CapabilityKindDropped {
                            component_type: &self.component_type,
                            kind,
                        }
                    ),
                }
            }
        }

        table
    }
}
