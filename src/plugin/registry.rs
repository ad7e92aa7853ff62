// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Capability registrations and component factories.
//!
//! A loaded plugin becomes one `ComponentFactory`: its component type, its
//! default configuration, and one registration per distinct
//! `(capability kind, stability level)` pair in its metadata. The pipeline
//! asks the factory for wrappers; each wrapper drives its own instances.

use crate::observability::messages::plugin::FactoryBuilt;
use crate::pipeline::{CapabilityKind, CreateSettings, Role, Sink};
use crate::plugin::loader::Plugin;
use crate::plugin::metadata::StabilityLevel;
use crate::plugin::wrapper::OperationalWrapper;
use crate::wasm::error::{PluginError, PluginResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates wrappers for one capability of a plugin.
#[derive(Clone)]
pub struct HandlerFactory {
    plugin: Arc<Plugin>,
    kind: Option<CapabilityKind>,
}

impl HandlerFactory {
    /// Fails with `MissingExport` if the plugin cannot be started.
    pub fn create(
        &self,
        settings: CreateSettings,
        overrides: &Value,
        sink: Option<Arc<dyn Sink>>,
    ) -> PluginResult<OperationalWrapper> {
        self.plugin.ensure_startable()?;
        Ok(OperationalWrapper::new(
            Arc::clone(&self.plugin),
            self.kind,
            settings,
            self.plugin.effective_config(overrides),
            sink,
        ))
    }
}

#[derive(Clone)]
pub struct Registration {
    pub kind: CapabilityKind,
    pub stability: StabilityLevel,
    pub factory: HandlerFactory,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("stability", &self.stability)
            .finish()
    }
}

/// One registration per distinct `(kind, level)` pair, ordered by kind then
/// level.
pub fn build_registrations(plugin: &Arc<Plugin>) -> Vec<Registration> {
    plugin
        .metadata()
        .capabilities()
        .into_iter()
        .map(|(kind, stability)| Registration {
            kind,
            stability,
            factory: HandlerFactory {
                plugin: Arc::clone(plugin),
                kind: Some(kind),
            },
        })
        .collect()
}

/// What the pipeline sees of a loaded plugin.
#[derive(Clone)]
pub struct ComponentFactory {
    component_type: String,
    role: Role,
    default_config: Value,
    registrations: Vec<Registration>,
    plugin: Arc<Plugin>,
}

impl ComponentFactory {
    pub fn new(plugin: Arc<Plugin>) -> Self {
        let registrations = build_registrations(&plugin);

        let factory = Self {
            component_type: plugin.component_type().to_string(),
            role: plugin.role(),
            default_config: plugin.default_config().clone(),
            registrations,
            plugin,
        };

        tracing::info!(
            "{}",
            FactoryBuilt {
                component_type: &factory.component_type,
                role: factory.role.as_str(),
                registrations: &factory.describe_registrations(),
            }
        );

        factory
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn default_config(&self) -> &Value {
        &self.default_config
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn plugin(&self) -> &Arc<Plugin> {
        &self.plugin
    }

    /// The registration for `kind`. When a kind is declared at several
    /// levels, the most stable one wins.
    pub fn registration(&self, kind: CapabilityKind) -> Option<&Registration> {
        self.registrations
            .iter()
            .filter(|r| r.kind == kind)
            .max_by_key(|r| r.stability)
    }

    /// Creates a wrapper handling `kind` that forwards records to `sink`.
    pub fn create(
        &self,
        kind: CapabilityKind,
        settings: CreateSettings,
        overrides: &Value,
        sink: Arc<dyn Sink>,
    ) -> PluginResult<OperationalWrapper> {
        if !self.role.takes_sink() {
            return Err(self.unsupported(kind.as_str()));
        }

        let registration = self
            .registration(kind)
            .ok_or_else(|| self.unsupported(kind.as_str()))?;
        registration.factory.create(settings, overrides, Some(sink))
    }

    /// Creates a sink-less wrapper for an extension plugin.
    pub fn create_extension(
        &self,
        settings: CreateSettings,
        overrides: &Value,
    ) -> PluginResult<OperationalWrapper> {
        if self.role != Role::Extension {
            return Err(self.unsupported("extension"));
        }

        let factory = HandlerFactory {
            plugin: Arc::clone(&self.plugin),
            kind: None,
        };
        factory.create(settings, overrides, None)
    }

    /// `kind@level` labels, for logging.
    pub fn describe_registrations(&self) -> Vec<String> {
        self.registrations
            .iter()
            .map(|r| format!("{}@{}", r.kind, r.stability))
            .collect()
    }

    fn unsupported(&self, capability: &str) -> PluginError {
        PluginError::UnsupportedCapability {
            component_type: self.component_type.clone(),
            capability: capability.to_string(),
        }
    }
}

/// Factories keyed by component type.
#[derive(Clone, Default)]
pub struct FactoryMap(BTreeMap<String, ComponentFactory>);

impl FactoryMap {
    /// Builds the map, rejecting duplicate component types.
    pub fn new(factories: Vec<ComponentFactory>) -> PluginResult<Self> {
        let mut map = BTreeMap::new();
        for factory in factories {
            let component_type = factory.component_type().to_string();
            if map.insert(component_type.clone(), factory).is_some() {
                return Err(PluginError::Config(format!(
                    "duplicate component type '{}'",
                    component_type
                )));
            }
        }
        Ok(Self(map))
    }

    pub fn get(&self, component_type: &str) -> Option<&ComponentFactory> {
        self.0.get(component_type)
    }

    pub fn contains_key(&self, component_type: &str) -> bool {
        self.0.contains_key(component_type)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentFactory)> {
        self.0.iter()
    }
}

impl std::fmt::Debug for FactoryMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryMap")
            .field("factory_count", &self.0.len())
            .field("component_types", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}
