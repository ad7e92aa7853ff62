// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Interfaces the host shares with the surrounding telemetry pipeline.
//!
//! The pipeline framework itself lives elsewhere; the host only needs the
//! component roles, the start/shutdown lifecycle contract, and somewhere to
//! forward the records a plugin produces.

pub mod sink;

use crate::wasm::error::PluginResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::{Display, Formatter};

pub use sink::{CollectingSink, LoggingSink, Sink};

/// Where a component sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Receiver,
    Processor,
    Extension,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receiver => "receiver",
            Self::Processor => "processor",
            Self::Extension => "extension",
        }
    }

    /// Extensions have no signal flowing through them, so no sink.
    pub fn takes_sink(self) -> bool {
        !matches!(self, Self::Extension)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry signal a component can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityKind {
    Logs,
    Metrics,
    Traces,
}

impl CapabilityKind {
    /// Recognizes `logs`, `metrics` and `traces`, ignoring ASCII case.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        [Self::Logs, Self::Metrics, Self::Traces]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(label))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Metrics => "metrics",
            Self::Traces => "traces",
        }
    }
}

impl Display for CapabilityKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one component instance created by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSettings {
    pub id: String,
}

impl CreateSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Lifecycle contract every pipeline component honours.
#[async_trait]
pub trait Component: Send + Sync {
    async fn start(&self) -> PluginResult<()>;

    async fn shutdown(&self) -> PluginResult<()>;
}
