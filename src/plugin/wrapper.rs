// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operational wrapper
//!
//! The long-lived object the pipeline holds for one component. It owns at
//! most one live instance and drives it through the guest lifecycle:
//!
//! ```text
//!          start                 stop
//!   Idle ────────► Starting ──► Running ────────► Stopping ──► Idle
//!    │  ◄──────────── (error)                                   │
//!    └──────────────────────────► Closed ◄──────────────────────┘
//!                   close
//! ```
//!
//! Overlapping operations are detected, never waited on: transitional states
//! reject a second `start`/`stop`, and the live instance sits behind a lock
//! that `poll` and `stop` only ever `try_lock`.

use crate::observability::messages::instance::{
    RecordsDropped, RecordsForwarded, WrapperClosed, WrapperStartFailed, WrapperStarted,
    WrapperStopFailed, WrapperStopped,
};
use crate::pipeline::{CapabilityKind, Component, CreateSettings, Sink};
use crate::plugin::loader::Plugin;
use crate::wasm::abi;
use crate::wasm::compiler::{COLLECT_EXPORT, START_EXPORT, STOP_EXPORT};
use crate::wasm::error::{PluginError, PluginResult};
use crate::wasm::instance::PluginInstance;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    Idle,
    Starting,
    Running,
    Stopping,
    Closed,
}

impl Display for WrapperState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// `{ "error": "..." }` as returned by `start` and `stop`.
#[derive(Debug, Default, Deserialize)]
struct GuestReply {
    #[serde(default)]
    error: Option<String>,
}

/// `{ "records": [...] }` as returned by `collect`.
#[derive(Debug, Default, Deserialize)]
struct RecordBatch {
    #[serde(default)]
    records: Vec<Value>,
}

fn reported_error(reply: Option<GuestReply>) -> Option<String> {
    reply
        .and_then(|reply| reply.error)
        .filter(|message| !message.is_empty())
}

pub struct OperationalWrapper {
    plugin: Arc<Plugin>,
    kind: Option<CapabilityKind>,
    settings: CreateSettings,
    config: Value,
    sink: Option<Arc<dyn Sink>>,
    state: Mutex<WrapperState>,
    instance: Mutex<Option<PluginInstance>>,
}

impl OperationalWrapper {
    pub fn new(
        plugin: Arc<Plugin>,
        kind: Option<CapabilityKind>,
        settings: CreateSettings,
        config: Value,
        sink: Option<Arc<dyn Sink>>,
    ) -> Self {
        Self {
            plugin,
            kind,
            settings,
            config,
            sink,
            state: Mutex::new(WrapperState::Idle),
            instance: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn kind(&self) -> Option<CapabilityKind> {
        self.kind
    }

    /// The configuration handed to every instance this wrapper creates.
    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn state(&self) -> WrapperState {
        *self.lock_state()
    }

    /// Instantiates a fresh guest and calls its `start` export.
    ///
    /// # Errors
    /// * `ConcurrentOperation` - not `Idle`
    /// * `MissingExport` - the module lacks the start/stop contract; nothing
    ///   is instantiated
    /// * `Start` - the guest reported an error
    /// * `GuestTrap`, `Decode`, `OutOfRange`, `Instantiation` - the instance
    ///   is destroyed and the wrapper returns to `Idle`
    pub async fn start(&self) -> PluginResult<()> {
        {
            let mut state = self.lock_state();
            match *state {
                WrapperState::Idle => *state = WrapperState::Starting,
                WrapperState::Closed => return Err(self.closed()),
                other => return Err(concurrent("start", other)),
            }
        }

        match self.run_start() {
            Ok(instance) => {
                *self.lock_instance() = Some(instance);
                self.set_state(WrapperState::Running);
                tracing::info!(
                    "{}",
                    WrapperStarted {
                        component_id: self.id(),
                        component_type: self.plugin.component_type(),
                        kind: self.kind_label(),
                    }
                );
                Ok(())
            }
            Err(error) => {
                self.set_state(WrapperState::Idle);
                tracing::error!(
                    "{}",
                    WrapperStartFailed {
                        component_id: self.id(),
                        error: &error,
                    }
                );
                Err(error)
            }
        }
    }

    /// Calls the guest's `stop` export and destroys the instance.
    ///
    /// A no-op when `Idle`. The wrapper always ends `Idle`, whatever the guest
    /// reports.
    pub async fn stop(&self) -> PluginResult<()> {
        {
            let mut state = self.lock_state();
            match *state {
                WrapperState::Idle => return Ok(()),
                WrapperState::Running => *state = WrapperState::Stopping,
                WrapperState::Closed => return Err(self.closed()),
                other => return Err(concurrent("stop", other)),
            }
        }

        self.run_stop("stop")
    }

    /// Pulls pending records from the guest's `collect` export and forwards
    /// them to the sink. Returns the number forwarded.
    pub async fn poll(&self) -> PluginResult<usize> {
        let records = self.collect_records()?;
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let Some(sink) = &self.sink else {
            tracing::warn!(
                "{}",
                RecordsDropped {
                    component_id: self.id(),
                    count,
                }
            );
            return Ok(0);
        };

        sink.consume(self.kind, records)
            .await
            .map_err(|e| PluginError::Sink(format!("{:#}", e)))?;

        tracing::debug!(
            "{}",
            RecordsForwarded {
                component_id: self.id(),
                count,
            }
        );
        Ok(count)
    }

    /// Stops the guest if running, then rejects every further operation.
    pub async fn close(&self) -> PluginResult<()> {
        let running = {
            let mut state = self.lock_state();
            match *state {
                WrapperState::Idle => {
                    *state = WrapperState::Closed;
                    false
                }
                WrapperState::Running => {
                    *state = WrapperState::Stopping;
                    true
                }
                WrapperState::Closed => return Err(self.closed()),
                other => return Err(concurrent("close", other)),
            }
        };

        let result = if running { self.run_stop("close") } else { Ok(()) };

        {
            let mut state = self.lock_state();
            if *state == WrapperState::Idle {
                *state = WrapperState::Closed;
            }
        }

        if self.state() == WrapperState::Closed {
            tracing::info!("{}", WrapperClosed { component_id: self.id() });
        }
        result
    }

    fn run_start(&self) -> PluginResult<PluginInstance> {
        self.plugin.ensure_startable()?;
        let mut instance = self.plugin.instantiate(Some(&self.config))?;
        let reply: Option<GuestReply> = abi::call_json(&mut instance, START_EXPORT)?;

        match reported_error(reply) {
            Some(message) => Err(PluginError::Start(message)),
            None => Ok(instance),
        }
    }

    /// Expects the state to be `Stopping`. Leaves it `Idle`, or back at
    /// `Running` if a poll holds the instance.
    fn run_stop(&self, operation: &'static str) -> PluginResult<()> {
        let taken = match self.instance.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(TryLockError::WouldBlock) => {
                self.set_state(WrapperState::Running);
                return Err(concurrent(operation, WrapperState::Running));
            }
        };

        let result = match taken {
            Some(mut instance) => {
                let outcome = abi::call_json::<GuestReply>(&mut instance, STOP_EXPORT).and_then(
                    |reply| match reported_error(reply) {
                        Some(message) => Err(PluginError::Stop(message)),
                        None => Ok(()),
                    },
                );
                instance.destroy();
                outcome
            }
            None => Ok(()),
        };

        self.set_state(WrapperState::Idle);
        match &result {
            Ok(()) => tracing::info!("{}", WrapperStopped { component_id: self.id() }),
            Err(error) => tracing::error!(
                "{}",
                WrapperStopFailed {
                    component_id: self.id(),
                    error,
                }
            ),
        }
        result
    }

    fn collect_records(&self) -> PluginResult<Vec<Value>> {
        match self.state() {
            WrapperState::Running => {}
            WrapperState::Closed => return Err(self.closed()),
            other => return Err(concurrent("poll", other)),
        }

        if !self.plugin.has_collect() {
            return Ok(Vec::new());
        }

        let mut slot = match self.instance.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(concurrent("poll", WrapperState::Running))
            }
        };
        let Some(instance) = slot.as_mut() else {
            return Err(concurrent("poll", self.state()));
        };

        let batch: Option<RecordBatch> = abi::call_json(instance, COLLECT_EXPORT)?;
        Ok(batch.map(|batch| batch.records).unwrap_or_default())
    }

    fn lock_state(&self) -> MutexGuard<'_, WrapperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_instance(&self) -> MutexGuard<'_, Option<PluginInstance>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WrapperState) {
        *self.lock_state() = next;
    }

    fn closed(&self) -> PluginError {
        PluginError::WrapperClosed(self.settings.id.clone())
    }

    fn kind_label(&self) -> &'static str {
        self.kind.map(CapabilityKind::as_str).unwrap_or("extension")
    }
}

fn concurrent(operation: &'static str, state: WrapperState) -> PluginError {
    PluginError::ConcurrentOperation {
        operation,
        state: state.to_string(),
    }
}

#[async_trait]
impl Component for OperationalWrapper {
    async fn start(&self) -> PluginResult<()> {
        OperationalWrapper::start(self).await
    }

    async fn shutdown(&self) -> PluginResult<()> {
        OperationalWrapper::stop(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CollectingSink, Role};
    use crate::plugin::loader::PluginOptions;
    use crate::wasm::compiler::ExportSurface;
    use crate::wasm::engine::create_engine;
    use crate::wasm::environment::SocketPolicy;
    use crate::wasm::instance::InstanceLimits;
    use crate::wasm::test_modules::{GuestModule, Response};
    use serde_json::json;

    fn plugin(module: GuestModule) -> Arc<Plugin> {
        let engine = create_engine().unwrap();
        let options = PluginOptions {
            role: Role::Receiver,
            surface: ExportSurface::Lifecycle,
            limits: InstanceLimits {
                fuel: 1_000_000,
                max_memory_bytes: 1 << 20,
            },
            sockets: SocketPolicy::default(),
            inherit_stdio: false,
        };
        Arc::new(Plugin::from_image(&engine, &module.to_image(), &options).unwrap())
    }

    fn wrapper(module: GuestModule, sink: Option<Arc<dyn Sink>>) -> OperationalWrapper {
        OperationalWrapper::new(
            plugin(module),
            Some(CapabilityKind::Logs),
            CreateSettings::new("test/1"),
            json!({}),
            sink,
        )
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let w = wrapper(GuestModule::lifecycle(), None);
        assert_eq!(w.state(), WrapperState::Idle);

        w.start().await.unwrap();
        assert_eq!(w.state(), WrapperState::Running);

        w.stop().await.unwrap();
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let w = wrapper(GuestModule::lifecycle(), None);
        assert!(w.stop().await.is_ok());
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[tokio::test]
    async fn test_guest_start_error_returns_to_idle() {
        let module = GuestModule::lifecycle().respond(
            "start",
            Response::Json(r#"{"error":"port in use"}"#.to_string()),
        );
        let w = wrapper(module, None);

        match w.start().await {
            Err(PluginError::Start(message)) => assert_eq!(message, "port in use"),
            other => panic!("Expected Start error, got {:?}", other),
        }
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[tokio::test]
    async fn test_empty_error_field_is_success() {
        let module = GuestModule::lifecycle()
            .respond("start", Response::Json(r#"{"error":""}"#.to_string()))
            .respond("stop", Response::Json(r#"{"error":null}"#.to_string()));
        let w = wrapper(module, None);

        w.start().await.unwrap();
        w.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_guest_stop_error_still_ends_idle() {
        let module = GuestModule::lifecycle()
            .respond("stop", Response::Json(r#"{"error":"flush failed"}"#.to_string()));
        let w = wrapper(module, None);

        w.start().await.unwrap();
        match w.stop().await {
            Err(PluginError::Stop(message)) => assert_eq!(message, "flush failed"),
            other => panic!("Expected Stop error, got {:?}", other),
        }
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[tokio::test]
    async fn test_start_decode_error_returns_to_idle() {
        let module =
            GuestModule::lifecycle().respond("start", Response::Json("[1,2".to_string()));
        let w = wrapper(module, None);

        assert!(matches!(w.start().await, Err(PluginError::Decode { .. })));
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[tokio::test]
    async fn test_poll_forwards_records_to_sink() {
        let module = GuestModule::lifecycle().respond(
            "collect",
            Response::Json(r#"{"records":[{"body":"a"},{"body":"b"}]}"#.to_string()),
        );
        let sink = Arc::new(CollectingSink::new());
        let w = wrapper(module, Some(sink.clone()));

        w.start().await.unwrap();
        assert_eq!(w.poll().await.unwrap(), 2);
        assert_eq!(w.poll().await.unwrap(), 2);
        w.stop().await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1], (Some(CapabilityKind::Logs), json!({"body": "b"})));
    }

    #[tokio::test]
    async fn test_poll_without_collect_export() {
        let w = wrapper(GuestModule::lifecycle(), Some(Arc::new(CollectingSink::new())));
        w.start().await.unwrap();
        assert_eq!(w.poll().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_poll_requires_running() {
        let w = wrapper(GuestModule::lifecycle(), None);
        assert!(matches!(
            w.poll().await,
            Err(PluginError::ConcurrentOperation { operation: "poll", .. })
        ));
    }

    #[tokio::test]
    async fn test_close_stops_running_instance() {
        let w = wrapper(GuestModule::server(true), None);
        w.start().await.unwrap();

        w.close().await.unwrap();
        assert_eq!(w.state(), WrapperState::Closed);

        assert!(matches!(w.start().await, Err(PluginError::WrapperClosed(_))));
        assert!(matches!(w.stop().await, Err(PluginError::WrapperClosed(_))));
        assert!(matches!(w.poll().await, Err(PluginError::WrapperClosed(_))));
        assert!(matches!(w.close().await, Err(PluginError::WrapperClosed(_))));
    }

    #[tokio::test]
    async fn test_close_with_failing_stop_still_closes() {
        let module = GuestModule::lifecycle().respond("stop", Response::Trap);
        let w = wrapper(module, None);
        w.start().await.unwrap();

        assert!(matches!(w.close().await, Err(PluginError::GuestTrap { .. })));
        assert_eq!(w.state(), WrapperState::Closed);
    }

    #[tokio::test]
    async fn test_component_trait_drives_lifecycle() {
        let w = wrapper(GuestModule::lifecycle(), None);
        let component: &dyn Component = &w;

        component.start().await.unwrap();
        assert_eq!(w.state(), WrapperState::Running);
        component.shutdown().await.unwrap();
        assert_eq!(w.state(), WrapperState::Idle);
    }

    #[test]
    fn test_reported_error() {
        assert_eq!(reported_error(None), None);
        assert_eq!(reported_error(Some(GuestReply::default())), None);
        assert_eq!(
            reported_error(Some(GuestReply {
                error: Some(String::new())
            })),
            None
        );
        assert_eq!(
            reported_error(Some(GuestReply {
                error: Some("x".to_string())
            })),
            Some("x".to_string())
        );
    }
}
