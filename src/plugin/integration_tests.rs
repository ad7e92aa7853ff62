// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end scenarios: module bytes in, pipeline-facing behavior out.

use crate::pipeline::{CapabilityKind, CollectingSink, CreateSettings, Role, Sink};
use crate::plugin::loader::{Plugin, PluginOptions};
use crate::plugin::metadata::StabilityLevel;
use crate::plugin::registry::ComponentFactory;
use crate::plugin::wrapper::{OperationalWrapper, WrapperState};
use crate::wasm::compiler::ExportSurface;
use crate::wasm::engine::create_engine;
use crate::wasm::environment::SocketPolicy;
use crate::wasm::error::PluginError;
use crate::wasm::instance::InstanceLimits;
use crate::wasm::test_modules::{GuestModule, Response};
use serde_json::json;
use std::sync::Arc;

fn options(role: Role) -> PluginOptions {
    options_with_surface(role, ExportSurface::Lifecycle)
}

fn options_with_surface(role: Role, surface: ExportSurface) -> PluginOptions {
    PluginOptions {
        role,
        surface,
        limits: InstanceLimits {
            fuel: 1_000_000,
            max_memory_bytes: 1 << 20,
        },
        sockets: SocketPolicy::default(),
        inherit_stdio: false,
    }
}

fn factory(module: GuestModule, role: Role) -> ComponentFactory {
    let engine = create_engine().unwrap();
    let plugin = Plugin::from_image(&engine, &module.to_image(), &options(role)).unwrap();
    ComponentFactory::new(Arc::new(plugin))
}

fn logs_wrapper(factory: &ComponentFactory, id: &str) -> OperationalWrapper {
    factory
        .create(
            CapabilityKind::Logs,
            CreateSettings::new(id),
            &json!(null),
            Arc::new(CollectingSink::new()),
        )
        .unwrap()
}

#[test]
fn test_development_logs_registration() {
    let factory = factory(GuestModule::lifecycle(), Role::Receiver);

    assert_eq!(factory.component_type(), "test");
    assert_eq!(factory.default_config(), &json!({}));

    let registrations = factory.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].kind, CapabilityKind::Logs);
    assert_eq!(registrations[0].stability, StabilityLevel::Development);
}

#[tokio::test]
async fn test_second_start_rejected_while_running() {
    let factory = factory(GuestModule::server(false), Role::Receiver);
    let wrapper = logs_wrapper(&factory, "test/1");

    wrapper.start().await.unwrap();
    match wrapper.start().await {
        Err(PluginError::ConcurrentOperation { operation, state }) => {
            assert_eq!(operation, "start");
            assert_eq!(state, "running");
        }
        other => panic!("Expected ConcurrentOperation, got {:?}", other),
    }
    assert_eq!(wrapper.state(), WrapperState::Running);
}

#[tokio::test]
async fn test_guest_already_started_is_start_error() {
    // The guest's own flag is set before `start` runs.
    let module = GuestModule::server(false).with_item(
        r#"(func (export "_initialize") (global.set $started (i32.const 1)))"#,
    );
    let factory = factory(module, Role::Receiver);
    let wrapper = logs_wrapper(&factory, "test/1");

    match wrapper.start().await {
        Err(PluginError::Start(message)) => assert_eq!(message, "already started"),
        other => panic!("Expected Start error, got {:?}", other),
    }
    assert_eq!(wrapper.state(), WrapperState::Idle);
}

#[tokio::test]
async fn test_every_start_uses_fresh_instance() {
    // Without a reset in `stop`, reusing an instance would report
    // "already started" on the second start.
    let factory = factory(GuestModule::server(false), Role::Receiver);
    let wrapper = logs_wrapper(&factory, "test/1");

    for _ in 0..3 {
        wrapper.start().await.unwrap();
        wrapper.stop().await.unwrap();
    }
    assert_eq!(wrapper.state(), WrapperState::Idle);
}

#[tokio::test]
async fn test_trapping_stop_ends_idle() {
    let module = GuestModule::lifecycle().respond("stop", Response::Trap);
    let factory = factory(module, Role::Receiver);
    let wrapper = logs_wrapper(&factory, "test/1");

    wrapper.start().await.unwrap();
    match wrapper.stop().await {
        Err(PluginError::GuestTrap { function, .. }) => assert_eq!(function, "stop"),
        other => panic!("Expected GuestTrap, got {:?}", other),
    }
    assert_eq!(wrapper.state(), WrapperState::Idle);

    // The wrapper is usable again.
    wrapper.start().await.unwrap();
}

#[test]
fn test_unknown_stability_is_undefined() {
    let module = GuestModule::lifecycle().respond(
        "metadata",
        Response::Json(r#"{"type":"test","status":{"stability":{"shiny":["logs"]}}}"#.to_string()),
    );
    let factory = factory(module, Role::Receiver);

    let registrations = factory.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].stability, StabilityLevel::Undefined);
}

#[tokio::test]
async fn test_free_failure_poisons_only_the_running_instance() {
    let module = GuestModule::lifecycle()
        .respond("start", Response::Json(r#"{"error":""}"#.to_string()))
        .trapping_free();
    // The load-time probes are poisoned too, but each is discarded right
    // after its single call.
    let factory = factory(module, Role::Receiver);
    let wrapper = logs_wrapper(&factory, "test/1");

    // `start` itself succeeds; the poisoned instance fails the next call.
    wrapper.start().await.unwrap();
    assert!(matches!(
        wrapper.stop().await,
        Err(PluginError::InstancePoisoned(_))
    ));
    assert_eq!(wrapper.state(), WrapperState::Idle);

    // A new start gets a new, healthy instance.
    wrapper.start().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_effective_config_reaches_guest() {
    // `collect` echoes the PLUGIN_CONFIG environment variable back as its
    // payload, skipping the `PLUGIN_CONFIG=` prefix and trailing NUL.
    let collect = "(drop (call $environ_sizes_get (i32.const 256) (i32.const 260))) \
                   (drop (call $environ_get (i32.const 512) (i32.const 8192))) \
                   (i64.or (i64.shl (i64.const 8206) (i64.const 32)) \
                     (i64.extend_i32_u (i32.sub (i32.load (i32.const 260)) (i32.const 15))))";
    let module = GuestModule::lifecycle()
        .with_import(
            r#"(import "wasi_snapshot_preview1" "environ_sizes_get" (func $environ_sizes_get (param i32 i32) (result i32)))"#,
        )
        .with_import(
            r#"(import "wasi_snapshot_preview1" "environ_get" (func $environ_get (param i32 i32) (result i32)))"#,
        )
        .respond(
            "defaultConfig",
            Response::Json(r#"{"records":[],"level":"info"}"#.to_string()),
        )
        .respond("collect", Response::Body(collect.to_string()));

    let factory = factory(module, Role::Receiver);
    let sink = Arc::new(CollectingSink::new());
    let wrapper = factory
        .create(
            CapabilityKind::Logs,
            CreateSettings::new("test/1"),
            &json!({"records": [{"echo": true}]}),
            sink.clone(),
        )
        .unwrap();
    assert_eq!(
        wrapper.config(),
        &json!({"records": [{"echo": true}], "level": "info"})
    );

    wrapper.start().await.unwrap();
    assert_eq!(wrapper.poll().await.unwrap(), 1);
    wrapper.stop().await.unwrap();

    assert_eq!(
        sink.records(),
        vec![(Some(CapabilityKind::Logs), json!({"echo": true}))]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrappers_sharing_a_plugin_run_on_separate_tasks() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Plugin>();
    assert_send_sync::<OperationalWrapper>();

    let factory = factory(GuestModule::server(false), Role::Processor);
    let sink: Arc<dyn Sink> = Arc::new(CollectingSink::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let wrapper = factory
                .create(
                    CapabilityKind::Logs,
                    CreateSettings::new(format!("test/{}", i)),
                    &json!(null),
                    Arc::clone(&sink),
                )
                .unwrap();
            tokio::spawn(async move {
                wrapper.start().await?;
                wrapper.stop().await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[test]
fn test_extension_plugin_lifecycle_without_sink() {
    let factory = factory(GuestModule::lifecycle(), Role::Extension);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let wrapper = factory
        .create_extension(CreateSettings::new("ext"), &json!({}))
        .unwrap();
    assert!(wrapper.kind().is_none());

    runtime.block_on(async {
        wrapper.start().await.unwrap();
        assert_eq!(wrapper.poll().await.unwrap(), 0);
        wrapper.close().await.unwrap();
    });
    assert_eq!(wrapper.state(), WrapperState::Closed);
}

/// `_initialize` traps whenever `PLUGIN_CONFIG` is set. Load-time probes run
/// without it, so only an instance created for `start` would trap.
fn traps_when_started(module: GuestModule) -> GuestModule {
    module
        .with_import(
            r#"(import "wasi_snapshot_preview1" "environ_sizes_get" (func $environ_sizes_get (param i32 i32) (result i32)))"#,
        )
        .with_item(
            r#"(func (export "_initialize")
                (drop (call $environ_sizes_get (i32.const 256) (i32.const 260)))
                (if (i32.load (i32.const 256)) (then (unreachable))))"#,
        )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discovery_plugin_never_instantiated_for_start() {
    let engine = create_engine().unwrap();

    // Same guest with the full contract: `start` does reach `_initialize`.
    let lifecycle = Plugin::from_image(
        &engine,
        &traps_when_started(GuestModule::lifecycle()).to_image(),
        &options(Role::Receiver),
    )
    .unwrap();
    let wrapper = OperationalWrapper::new(
        Arc::new(lifecycle),
        Some(CapabilityKind::Logs),
        CreateSettings::new("lifecycle"),
        json!({}),
        None,
    );
    match wrapper.start().await {
        Err(PluginError::GuestTrap { function, .. }) => assert_eq!(function, "_initialize"),
        other => panic!("Expected GuestTrap, got {:?}", other),
    }

    let discovery = Arc::new(
        Plugin::from_image(
            &engine,
            &traps_when_started(GuestModule::discovery()).to_image(),
            &options_with_surface(Role::Receiver, ExportSurface::Discovery),
        )
        .unwrap(),
    );
    let factory = ComponentFactory::new(Arc::clone(&discovery));
    assert_eq!(factory.registrations().len(), 1);
    match factory.create(
        CapabilityKind::Logs,
        CreateSettings::new("discovery/1"),
        &json!(null),
        Arc::new(CollectingSink::new()),
    ) {
        Err(PluginError::MissingExport(name)) => assert_eq!(name, "start"),
        other => panic!("Expected MissingExport, got {:?}", other.map(|w| w.state())),
    }

    // A wrapper built by hand is refused before any instance exists.
    let wrapper = OperationalWrapper::new(
        discovery,
        Some(CapabilityKind::Logs),
        CreateSettings::new("discovery/2"),
        json!({}),
        None,
    );
    match wrapper.start().await {
        Err(PluginError::MissingExport(name)) => assert_eq!(name, "start"),
        other => panic!("Expected MissingExport, got {:?}", other),
    }
    assert_eq!(wrapper.state(), WrapperState::Idle);
}
