//! Dependency injection container
//!
//! This module provides a minimal service container that satisfies the
//! injector, controller and filter lookup contracts, and the
//! [`Collaborators`] bundle the compiler hands to every request pipeline.

use std::{any::Any, sync::Arc};

use dashmap::DashMap;
use log::debug;

use super::{
    context::Component,
    controller::Controller,
    traits::{ControllerRegistry, Filter, FilterRegistry, Injector},
};

/// Main dependency injection container
#[derive(Default)]
pub struct Container {
    /// Named providers, injectable by name
    providers: DashMap<String, Component>,

    /// Controllers, looked up by the pipeline's action resolution
    controllers: DashMap<String, Arc<Controller>>,

    /// Filters, looked up by name from route descriptors
    filters: DashMap<String, Component>,
}

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain value provider
    pub fn value<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> &Self {
        self.provide(name, Component::value(value))
    }

    /// Register a provider of any component kind
    pub fn provide(&self, name: impl Into<String>, component: Component) -> &Self {
        let name = name.into();
        debug!("Registering provider: {}", name);
        self.providers.insert(name, component);
        self
    }

    /// Register a controller under its own name
    pub fn register_controller(&self, controller: Controller) -> &Self {
        debug!("Registering controller: {}", controller.name());
        self.controllers
            .insert(controller.name().to_string(), Arc::new(controller));
        self
    }

    /// Register a named filter
    pub fn register_filter(&self, name: impl Into<String>, filter: Arc<dyn Filter>) -> &Self {
        self.register_filter_component(name, Component::Filter(filter))
    }

    /// Register anything under a filter name; non-filters fail at request time
    pub fn register_filter_component(&self, name: impl Into<String>, component: Component) -> &Self {
        let name = name.into();
        debug!("Registering filter: {}", name);
        self.filters.insert(name, component);
        self
    }
}

impl Injector for Container {
    fn get(&self, name: &str) -> Option<Component> {
        if let Some(entry) = self.providers.get(name) {
            return Some(entry.value().clone());
        }
        self.controllers
            .get(name)
            .map(|entry| Component::Controller(entry.value().clone()))
    }
}

impl ControllerRegistry for Container {
    fn controller(&self, name: &str) -> Option<Arc<Controller>> {
        self.controllers.get(name).map(|entry| entry.value().clone())
    }
}

impl FilterRegistry for Container {
    fn filter(&self, name: &str) -> Option<Component> {
        self.filters.get(name).map(|entry| entry.value().clone())
    }
}

/// Collaborators consulted by every request pipeline
#[derive(Clone)]
pub struct Collaborators {
    injector: Arc<dyn Injector>,
    controllers: Arc<dyn ControllerRegistry>,
    filters: Arc<dyn FilterRegistry>,
}

impl Collaborators {
    /// Bundle custom collaborator implementations
    pub fn with_components(
        injector: Arc<dyn Injector>,
        controllers: Arc<dyn ControllerRegistry>,
        filters: Arc<dyn FilterRegistry>,
    ) -> Self {
        Self {
            injector,
            controllers,
            filters,
        }
    }

    /// Use one container for all three roles
    pub fn from_container(container: Arc<Container>) -> Self {
        Self {
            injector: container.clone(),
            controllers: container.clone(),
            filters: container,
        }
    }

    pub fn injector(&self) -> &dyn Injector {
        self.injector.as_ref()
    }

    pub fn controllers(&self) -> &dyn ControllerRegistry {
        self.controllers.as_ref()
    }

    pub fn filters(&self) -> &dyn FilterRegistry {
        self.filters.as_ref()
    }
}
