//! Binds a route registry onto a server adapter

use std::sync::Arc;

use log::{debug, info};

use super::{
    descriptor::{RouteDescriptor, RouteMethod},
    pipeline::RoutePipeline,
    registry::RouteRegistry,
};
use crate::core::{
    container::Collaborators,
    controller::Callback,
    error::RouterResult,
    traits::{ErrorHandler, Handler, ServerAdapter},
};

/// What a call to [`compile`] bound onto the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub standard: usize,
    pub errors: usize,
    pub otherwise: bool,
    /// The registry had already been compiled; nothing was bound
    pub skipped: bool,
}

/// Register every route in `registry` with `server`.
///
/// Standard routes go first in registration order, then the otherwise route
/// on all paths (generic middleware unless it declares a method), then the
/// error routes. Only the first call on a registry has any effect.
pub fn compile<S: ServerAdapter + ?Sized>(
    registry: &RouteRegistry,
    server: &mut S,
    collaborators: Arc<Collaborators>,
) -> RouterResult<CompileReport> {
    if !registry.mark_compiled() {
        debug!("Routes already compiled, skipping");
        return Ok(CompileReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = CompileReport::default();

    for descriptor in registry.standard_routes() {
        bind_route(server, descriptor, descriptor.path(), &collaborators)?;
        report.standard += 1;
    }

    if let Some(descriptor) = registry.otherwise_route() {
        bind_route(server, descriptor, None, &collaborators)?;
        report.otherwise = true;
    }

    for descriptor in registry.error_routes() {
        let handler: Arc<dyn ErrorHandler> = match descriptor.plain_callback() {
            Some(Callback::Error(handler)) => handler.clone(),
            _ => Arc::new(RoutePipeline::new(descriptor.clone(), collaborators.clone())),
        };
        debug!("Binding error route #{}", report.errors);
        server.add_error_route(handler)?;
        report.errors += 1;
    }

    info!(
        "Compiled {} standard routes, {} error routes{}",
        report.standard,
        report.errors,
        if report.otherwise { " and an otherwise route" } else { "" }
    );

    Ok(report)
}

fn bind_route<S: ServerAdapter + ?Sized>(
    server: &mut S,
    descriptor: &Arc<RouteDescriptor>,
    path: Option<&str>,
    collaborators: &Arc<Collaborators>,
) -> RouterResult<()> {
    let handler: Arc<dyn Handler> = match descriptor.plain_callback() {
        Some(Callback::Standard(handler)) => handler.clone(),
        _ => Arc::new(RoutePipeline::new(descriptor.clone(), collaborators.clone())),
    };
    let method = descriptor.method();
    debug!("Binding {} {}", method, path.unwrap_or("*"));
    server.add_route(method, path, handler)
}
