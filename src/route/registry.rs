//! Route registry
//!
//! Accumulates validated route descriptors in registration order until the
//! compiler binds them onto a server. Every registration method validates its
//! input immediately and returns the registry so calls can be chained with `?`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info};
use serde_json::Value as JsonValue;

use super::descriptor::{
    FilterRef, RouteAction, RouteConfig, RouteDescriptor, RouteMethod, RouteSpec,
};
use crate::{
    config::RoutesConfig,
    core::{
        context::{Expr, Invocable, ResolveMap},
        controller::Callback,
        error::{ErrorCode, RouterResult},
    },
    router_error,
};

/// Fallback route: a redirect target or a full route
#[derive(Clone, Debug)]
pub enum Fallback {
    Redirect(String),
    Route(RouteSpec),
}

impl From<&str> for Fallback {
    fn from(target: &str) -> Self {
        Fallback::Redirect(target.to_string())
    }
}

impl From<String> for Fallback {
    fn from(target: String) -> Self {
        Fallback::Redirect(target)
    }
}

impl From<RouteSpec> for Fallback {
    fn from(spec: RouteSpec) -> Self {
        Fallback::Route(spec)
    }
}

impl From<RouteConfig> for Fallback {
    fn from(config: RouteConfig) -> Self {
        Fallback::Route(config.into())
    }
}

impl From<Callback> for Fallback {
    fn from(callback: Callback) -> Self {
        Fallback::Route(callback.into())
    }
}

impl From<Invocable> for Fallback {
    fn from(invocable: Invocable) -> Self {
        Fallback::Route(invocable.into())
    }
}

impl From<JsonValue> for Fallback {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::String(target) => Fallback::Redirect(target),
            other => Fallback::Route(other.into()),
        }
    }
}

/// Controller-backed resource: one route per verb, sharing filter and resolve
#[derive(Clone, Debug, Default)]
pub struct ResourceConfig {
    pub controller: Option<String>,
    pub actions: Vec<(RouteMethod, String)>,
    pub filter: Option<FilterRef>,
    pub resolve: Option<ResolveMap>,
}

impl ResourceConfig {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: Some(controller.into()),
            ..Default::default()
        }
    }

    /// Map `method` to the controller member `action`
    pub fn action(mut self, method: RouteMethod, action: impl Into<String>) -> Self {
        self.actions.push((method, action.into()));
        self
    }

    pub fn filter(mut self, filter: impl Into<FilterRef>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn resolve(mut self, name: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.resolve
            .get_or_insert_with(ResolveMap::new)
            .insert(name, expr);
        self
    }
}

/// Ordered registry of standard, fallback and error routes
#[derive(Default)]
pub struct RouteRegistry {
    standard: Vec<Arc<RouteDescriptor>>,
    errors: Vec<Arc<RouteDescriptor>>,
    otherwise: Option<Arc<RouteDescriptor>>,
    compiled: AtomicBool,
}

impl RouteRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. A `None` path applies the route to every path.
    pub fn when(&mut self, path: Option<&str>, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(path, None, route.into())
    }

    pub fn get(&mut self, path: &str, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(Some(path), Some(RouteMethod::Get), route.into())
    }

    pub fn post(&mut self, path: &str, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(Some(path), Some(RouteMethod::Post), route.into())
    }

    pub fn put(&mut self, path: &str, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(Some(path), Some(RouteMethod::Put), route.into())
    }

    pub fn delete(&mut self, path: &str, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(Some(path), Some(RouteMethod::Delete), route.into())
    }

    pub fn all(&mut self, path: &str, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.register(Some(path), Some(RouteMethod::All), route.into())
    }

    /// Register error-handling middleware
    pub fn error(&mut self, route: impl Into<RouteSpec>) -> RouterResult<&mut Self> {
        self.ensure_mutable("error route")?;
        let descriptor = RouteDescriptor::build(None, Some(RouteMethod::Use), route.into())?;

        if let RouteAction::Callback(Callback::Standard(_)) = descriptor.action() {
            return Err(router_error!(
                ErrorCode::BadRoute,
                "Invalid error route, expected an (err, req, res, next) handler or an invocable, got a (req, res, next) handler"
            ));
        }

        debug!("Registered error route #{}", self.errors.len());
        self.errors.push(Arc::new(descriptor));
        Ok(self)
    }

    /// Set the fallback route; a string is a redirect target. Last call wins.
    pub fn otherwise(&mut self, fallback: impl Into<Fallback>) -> RouterResult<&mut Self> {
        self.ensure_mutable("otherwise route")?;
        let spec = match fallback.into() {
            Fallback::Redirect(target) => RouteConfig::redirect(target).into(),
            Fallback::Route(spec) => spec,
        };
        let descriptor = RouteDescriptor::build(None, None, spec)?;

        if self.otherwise.is_some() {
            debug!("Replacing previously registered otherwise route");
        }
        self.otherwise = Some(Arc::new(descriptor));
        Ok(self)
    }

    /// Expand a resource into one route per declared verb.
    ///
    /// Every expansion is validated before any of them is registered.
    pub fn resource(&mut self, path: &str, resource: ResourceConfig) -> RouterResult<&mut Self> {
        self.ensure_mutable(path)?;
        if resource.actions.is_empty() {
            return Err(router_error!(
                ErrorCode::BadRoute,
                "Resource '{0}' declares no actions",
                path
            ));
        }

        let descriptors = resource
            .actions
            .iter()
            .map(|(method, action)| {
                let config = RouteConfig {
                    controller: resource.controller.clone(),
                    action: Some(action.clone()),
                    filter: resource.filter.clone(),
                    resolve: resource.resolve.clone(),
                    ..Default::default()
                };
                RouteDescriptor::build(Some(path), Some(*method), config.into())
            })
            .collect::<RouterResult<Vec<_>>>()?;

        debug!("Registered resource {} with {} routes", path, descriptors.len());
        self.standard
            .extend(descriptors.into_iter().map(Arc::new));
        Ok(self)
    }

    /// Register every route declared in `config`
    pub fn load(&mut self, config: &RoutesConfig) -> RouterResult<&mut Self> {
        info!(
            "Loading {} routes and {} resources",
            config.routes.len(),
            config.resources.len()
        );

        for entry in &config.routes {
            let route = entry.to_route_config()?;
            self.when(Some(entry.path.as_str()), route)?;
        }

        for entry in &config.resources {
            self.resource(&entry.path, entry.to_resource_config()?)?;
        }

        if let Some(target) = &config.otherwise {
            self.otherwise(target.as_str())?;
        }

        Ok(self)
    }

    fn register(
        &mut self,
        path: Option<&str>,
        method: Option<RouteMethod>,
        spec: RouteSpec,
    ) -> RouterResult<&mut Self> {
        self.ensure_mutable(path.unwrap_or("*"))?;
        let descriptor = RouteDescriptor::build(path, method, spec)?;

        debug!(
            "Registered {} route on {}",
            descriptor.method(),
            descriptor.display_path()
        );
        self.standard.push(Arc::new(descriptor));
        Ok(self)
    }

    fn ensure_mutable(&self, what: &str) -> RouterResult<()> {
        if self.is_compiled() {
            return Err(router_error!(
                ErrorCode::BadRoute,
                "Routes have already been compiled, cannot register '{0}'",
                what
            ));
        }
        Ok(())
    }

    /// Standard routes in registration order
    pub fn standard_routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.standard
    }

    /// Error routes in registration order
    pub fn error_routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.errors
    }

    pub fn otherwise_route(&self) -> Option<&Arc<RouteDescriptor>> {
        self.otherwise.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.load(Ordering::Acquire)
    }

    /// Set the compilation flag; true only for the first caller
    pub(crate) fn mark_compiled(&self) -> bool {
        self.compiled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Get route counts for monitoring
    pub fn get_stats(&self) -> RouteStats {
        RouteStats {
            standard_count: self.standard.len(),
            error_count: self.errors.len(),
            has_otherwise: self.otherwise.is_some(),
        }
    }
}

/// Statistics about registry contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStats {
    pub standard_count: usize,
    pub error_count: usize,
    pub has_otherwise: bool,
}
