//! Per-request pipeline
//!
//! A [`RoutePipeline`] owns one compiled descriptor and drives a matched
//! request through redirect, action resolution, the filter gate, dependency
//! resolution and finally invocation. Only controller actions are gated by
//! the filter; invocables and callbacks go straight to dependency resolution.
//! Any error raised along the way is returned to the server as [`Flow::Fail`].

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use super::descriptor::{
    FilterRef, RouteAction, RouteDescriptor, ACTION_PARAM, CONTROLLER_PARAM, DEFAULT_ACTION,
};
use crate::{
    core::{
        container::Collaborators,
        context::{Component, Locals},
        controller::{Action, Callback, Member},
        error::{ErrorCode, RouterError, RouterResult},
        traits::{ErrorHandler, Flow, Handler},
    },
    router_error,
    utils::{Request, Response},
};

/// Outcome of the filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Proceed,
    Handled,
}

/// Compiled handler for a single route
pub struct RoutePipeline {
    descriptor: Arc<RouteDescriptor>,
    collaborators: Arc<Collaborators>,
}

impl RoutePipeline {
    pub fn new(descriptor: Arc<RouteDescriptor>, collaborators: Arc<Collaborators>) -> Self {
        Self {
            descriptor,
            collaborators,
        }
    }

    pub fn descriptor(&self) -> &RouteDescriptor {
        &self.descriptor
    }

    /// Run the pipeline; `err` is set when dispatched from the error chain.
    pub async fn run(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow {
        match self.execute(err, req, res).await {
            Ok(flow) => flow,
            Err(e) => {
                warn!(
                    "Route {} {} failed for {} {}: {}",
                    self.descriptor.method(),
                    self.descriptor.display_path(),
                    req.method,
                    req.path(),
                    e
                );
                Flow::Fail(e)
            }
        }
    }

    async fn execute(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> RouterResult<Flow> {
        let action = match self.descriptor.action() {
            RouteAction::Redirect(target) => {
                debug!("Redirecting {} to {}", req.path(), target);
                res.redirect(target)?;
                return Ok(Flow::Handled);
            }
            RouteAction::Invocable(invocable) => Action::Invocable(invocable.clone()),
            RouteAction::Callback(callback) => Action::Callback(callback.clone()),
            RouteAction::Controller { controller, action } => {
                let Some(action) =
                    self.controller_action(req, controller.as_deref(), action.as_deref())?
                else {
                    return Ok(Flow::Next);
                };
                if self.filter_gate(err, req, res).await? == Gate::Handled {
                    return Ok(Flow::Handled);
                }
                action
            }
        };

        let locals = self.resolve_locals(err, req).await?;

        Ok(match action {
            Action::Invocable(invocable) => {
                self.collaborators
                    .injector()
                    .invoke(&invocable, err, req, res, &locals)
                    .await
            }
            Action::Callback(Callback::Standard(handler)) => handler.handle(req, res).await,
            Action::Callback(Callback::Error(handler)) => {
                handler.handle_error(err, req, res).await
            }
        })
    }

    /// Look up the controller member for this request.
    ///
    /// Path parameters override the descriptor's defaults. A missing member
    /// yields `None` so the server moves on to the next handler.
    fn controller_action(
        &self,
        req: &Request,
        controller: Option<&str>,
        action: Option<&str>,
    ) -> RouterResult<Option<Action>> {
        let name = req
            .param(CONTROLLER_PARAM)
            .or(controller)
            .ok_or_else(|| {
                router_error!(
                    ErrorCode::NoController,
                    "No controller specified for route '{0}'.",
                    self.descriptor.display_path()
                )
            })?;

        let controller = self.collaborators.controllers().controller(name).ok_or_else(|| {
            router_error!(
                ErrorCode::NoController,
                "Controller '{0}' is not available! You either misspelled the controller name or forgot to declare it.",
                name
            )
        })?;

        let action = req.param(ACTION_PARAM).or(action).unwrap_or(DEFAULT_ACTION);

        match controller.member(action) {
            Some(Member::Action(found)) => Ok(Some(found.clone())),
            Some(Member::Property(_)) => Err(router_error!(
                ErrorCode::NoAction,
                "Unrecognized action '{0}' on controller '{1}'",
                action,
                name
            )),
            None => {
                debug!("Controller {} has no member {}, skipping route", name, action);
                Ok(None)
            }
        }
    }

    async fn filter_gate(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> RouterResult<Gate> {
        let Some(filter_ref) = self.descriptor.filter() else {
            return Ok(Gate::Proceed);
        };

        let component = match filter_ref {
            FilterRef::Named(name) => self.collaborators.filters().filter(name),
            FilterRef::Factory(factory) => {
                let locals = Locals::request_scoped(req, err);
                Some(
                    self.collaborators
                        .injector()
                        .instantiate(factory, &locals)
                        .await?,
                )
            }
        };

        let filter = component
            .as_ref()
            .and_then(Component::as_filter)
            .ok_or_else(|| {
                router_error!(
                    ErrorCode::BadFilter,
                    "Filter factory did not yield a valid function in route '{0}'",
                    self.descriptor.display_path()
                )
            })?;

        if filter.filter(req, res).await? {
            debug!("Filter handled {} {}", req.method, req.path());
            Ok(Gate::Handled)
        } else {
            Ok(Gate::Proceed)
        }
    }

    async fn resolve_locals(
        &self,
        err: Option<&RouterError>,
        req: &Request,
    ) -> RouterResult<Locals> {
        let locals = Locals::request_scoped(req, err);
        match self.descriptor.resolve() {
            Some(map) => self.collaborators.injector().resolve(map, &locals).await,
            None => Ok(locals),
        }
    }
}

#[async_trait]
impl Handler for RoutePipeline {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        self.run(None, req, res).await
    }
}

#[async_trait]
impl ErrorHandler for RoutePipeline {
    async fn handle_error(
        &self,
        err: Option<&RouterError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow {
        self.run(err, req, res).await
    }
}
