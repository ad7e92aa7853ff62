// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::observability::messages::instance::RecordsSunk;
use crate::pipeline::CapabilityKind;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Downstream consumer of the records a plugin produces.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn consume(&self, kind: Option<CapabilityKind>, records: Vec<Value>) -> anyhow::Result<()>;
}

/// Writes every record to the log.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl Sink for LoggingSink {
    async fn consume(&self, kind: Option<CapabilityKind>, records: Vec<Value>) -> anyhow::Result<()> {
        let kind = kind.map(CapabilityKind::as_str).unwrap_or("-");
        for record in &records {
            tracing::info!(
                "{}",
                RecordsSunk {
                    kind,
                    record,
                }
            );
        }
        Ok(())
    }
}

/// Keeps records in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<(Option<CapabilityKind>, Value)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Option<CapabilityKind>, Value)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for CollectingSink {
    async fn consume(&self, kind: Option<CapabilityKind>, records: Vec<Value>) -> anyhow::Result<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("collecting sink lock poisoned"))?;
        stored.extend(records.into_iter().map(|record| (kind, record)));
        Ok(())
    }
}
