//! Core traits for the route registry
//!
//! This module defines the seams between the router and its collaborators:
//! the handler shapes a server adapter dispatches to, the adapter itself, and
//! the lookup/injection contracts of the DI container.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    context::{Args, Component, Expr, Factory, Invocable, Invocation, Locals, ResolveMap},
    controller::Controller,
    error::{ErrorCode, RouterError, RouterResult},
};
use crate::{
    route::RouteMethod,
    utils::{Request, Response},
};

/// Verdict of a handler, the equivalent of calling or not calling `next`
#[derive(Debug)]
pub enum Flow {
    /// The response has been produced, stop dispatching
    Handled,
    /// `next()`: continue with the next matching handler
    Next,
    /// `next(err)`: switch to the error handler chain
    Fail(RouterError),
}

impl Flow {
    pub fn is_handled(&self) -> bool {
        matches!(self, Flow::Handled)
    }
}

impl From<RouterResult<()>> for Flow {
    fn from(result: RouterResult<()>) -> Self {
        match result {
            Ok(()) => Flow::Handled,
            Err(err) => Flow::Fail(err),
        }
    }
}

/// Ordinary `(req, res, next)` handler
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Flow;
}

/// Error-shaped `(err, req, res, next)` handler.
///
/// `err` is `None` when an error-shaped action runs on a standard route.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle_error(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow;
}

/// Per-request gate
#[async_trait]
pub trait Filter: Send + Sync {
    /// Returns true if the request was handled and should not continue
    async fn filter(&self, req: &mut Request, res: &mut Response) -> RouterResult<bool>;
}

/// Registration surface of the underlying web server.
///
/// Handlers are dispatched in registration order.
pub trait ServerAdapter {
    /// Register a verb-specific handler, or a generic one for `RouteMethod::Use`.
    /// A `None` path applies to every path.
    fn add_route(
        &mut self,
        method: RouteMethod,
        path: Option<&str>,
        handler: Arc<dyn Handler>,
    ) -> RouterResult<()>;

    /// Register generic error-handling middleware
    fn add_error_route(&mut self, handler: Arc<dyn ErrorHandler>) -> RouterResult<()>;
}

/// Dependency injection contract
#[async_trait]
pub trait Injector: Send + Sync {
    /// Lookup primitive: a named component, or `None` when not registered
    fn get(&self, name: &str) -> Option<Component>;

    /// Resolve `deps` by name, from `locals` first then from the providers
    fn args(&self, deps: &[String], locals: &Locals) -> RouterResult<Args> {
        let mut args = Args::with_capacity(deps.len());
        for dep in deps {
            let value = match locals.value(dep) {
                Some(value) => value,
                None => self
                    .get(dep)
                    .map(Component::into_value)
                    .ok_or_else(|| unknown_provider(dep))?,
            };
            args.push(dep.clone(), value);
        }
        Ok(args)
    }

    /// Invocation primitive for actions
    async fn invoke(
        &self,
        invocable: &Invocable,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
        locals: &Locals,
    ) -> Flow {
        let args = match self.args(invocable.dependencies(), locals) {
            Ok(args) => args,
            Err(e) => return Flow::Fail(e),
        };
        invocable.call(Invocation { err, req, res, args }).await
    }

    /// Invocation primitive for factories
    async fn instantiate(&self, factory: &Factory, locals: &Locals) -> RouterResult<Component> {
        let args = self.args(factory.dependencies(), locals)?;
        factory.build(args).await
    }

    /// Resolution primitive: evaluate every entry of `map` in order.
    ///
    /// The returned locals contain `locals` plus one value per entry; later
    /// entries may depend on earlier ones.
    async fn resolve(&self, map: &ResolveMap, locals: &Locals) -> RouterResult<Locals> {
        let mut resolved = locals.clone();
        for (name, expr) in map.iter() {
            let value = match expr {
                Expr::Service(service) => self
                    .get(service)
                    .map(Component::into_value)
                    .ok_or_else(|| unknown_provider(service))?,
                Expr::Factory(factory) => self.instantiate(factory, &resolved).await?.into_value(),
            };
            resolved.insert_value(name, value);
        }
        Ok(resolved)
    }
}

fn unknown_provider(name: &str) -> RouterError {
    crate::router_error!(ErrorCode::UnknownProvider, "Unknown provider: {0}", name)
}

/// Controller lookup collaborator
pub trait ControllerRegistry: Send + Sync {
    fn controller(&self, name: &str) -> Option<Arc<Controller>>;
}

/// Filter lookup collaborator; may yield something that is not a filter
pub trait FilterRegistry: Send + Sync {
    fn filter(&self, name: &str) -> Option<Component>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync,
{
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        (self.0)(req, res)
    }
}

struct FnErrorHandler<F>(F);

#[async_trait]
impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(Option<&RouterError>, &mut Request, &mut Response) -> Flow + Send + Sync,
{
    async fn handle_error(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow {
        (self.0)(err, req, res)
    }
}

struct FnFilter<F>(F);

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: Fn(&mut Request, &mut Response) -> RouterResult<bool> + Send + Sync,
{
    async fn filter(&self, req: &mut Request, res: &mut Response) -> RouterResult<bool> {
        (self.0)(req, res)
    }
}

/// Wrap a synchronous closure as a [`Handler`]
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Wrap a synchronous closure as an [`ErrorHandler`]
pub fn error_handler_fn<F>(f: F) -> Arc<dyn ErrorHandler>
where
    F: Fn(Option<&RouterError>, &mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    Arc::new(FnErrorHandler(f))
}

/// Wrap a synchronous closure as a [`Filter`]
pub fn filter_fn<F>(f: F) -> Arc<dyn Filter>
where
    F: Fn(&mut Request, &mut Response) -> RouterResult<bool> + Send + Sync + 'static,
{
    Arc::new(FnFilter(f))
}
