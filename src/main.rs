// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wasi_plugin_host::config::{load_and_validate_config, PluginConfig};
use wasi_plugin_host::observability::messages::validation::ConfigLoaded;
use wasi_plugin_host::pipeline::{CreateSettings, LoggingSink, Role, Sink};
use wasi_plugin_host::plugin::{ComponentFactory, FactoryMap, OperationalWrapper, PluginLoader};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.yaml> [--run]", args[0]);
        eprintln!("Example: {} configs/host.yaml --run", args[0]);
        std::process::exit(1);
    }
    let run = args[2..].iter().any(|arg| arg == "--run");

    if let Err(e) = run_host(&args[1], run).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_host(config_path: &str, run: bool) -> Result<()> {
    let config = load_and_validate_config(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    tracing::info!(
        "{}",
        ConfigLoaded {
            config_path,
            plugin_count: config.plugins.len(),
        }
    );

    let loader = PluginLoader::new(config.wasm.clone())?;

    let mut loaded = Vec::with_capacity(config.plugins.len());
    for plugin in &config.plugins {
        let factory = loader
            .build_factory(plugin)
            .with_context(|| format!("loading plugin '{}' from {}", plugin.id, plugin.module))?;
        loaded.push((plugin, factory));
    }
    let factories = FactoryMap::new(loaded.iter().map(|(_, f)| f.clone()).collect())?;

    println!("Loaded {} component factories", factories.len());
    for (component_type, factory) in factories.iter() {
        let registrations = factory.describe_registrations();
        println!(
            "  {:<24} {:<10} [{}]",
            component_type,
            factory.role(),
            registrations.join(", ")
        );
    }

    if run {
        let sink: Arc<dyn Sink> = Arc::new(LoggingSink);
        for (plugin, factory) in &loaded {
            for wrapper in create_wrappers(plugin, factory, &sink)? {
                exercise(&wrapper)
                    .await
                    .with_context(|| format!("running component '{}'", wrapper.id()))?;
            }
        }
    }

    Ok(())
}

/// One wrapper per declared capability kind, or a single one for extensions.
/// Discovery-only plugins get none.
fn create_wrappers(
    plugin: &PluginConfig,
    factory: &ComponentFactory,
    sink: &Arc<dyn Sink>,
) -> Result<Vec<OperationalWrapper>> {
    if let Err(e) = factory.plugin().ensure_startable() {
        println!("  {:<24} not runnable: {}", plugin.id, e);
        return Ok(Vec::new());
    }
    if factory.role() == Role::Extension {
        let wrapper = factory.create_extension(CreateSettings::new(&plugin.id), &plugin.config)?;
        return Ok(vec![wrapper]);
    }

    let kinds: BTreeSet<_> = factory.registrations().iter().map(|r| r.kind).collect();
    kinds
        .into_iter()
        .map(|kind| {
            factory
                .create(
                    kind,
                    CreateSettings::new(format!("{}/{}", plugin.id, kind)),
                    &plugin.config,
                    Arc::clone(sink),
                )
                .map_err(Into::into)
        })
        .collect()
}

async fn exercise(wrapper: &OperationalWrapper) -> Result<()> {
    wrapper.start().await?;
    let forwarded = wrapper.poll().await;
    let closed = wrapper.close().await;

    let forwarded = forwarded?;
    closed?;
    println!("  {:<24} ran, {} record(s) forwarded", wrapper.id(), forwarded);
    Ok(())
}
