use std::{collections::BTreeMap, sync::Arc};

use http::StatusCode;
use log::{debug, error};
use matchit::Router as MatchRouter;

use crate::{
    core::{
        error::{ErrorCode, RouterError, RouterResult},
        traits::{ErrorHandler, Flow, Handler, ServerAdapter},
    },
    route::RouteMethod,
    router_error,
    utils::{request::normalize_path_pattern, Request, Response},
};

/// Catch-all parameters added by the dispatcher itself start with this prefix
const INTERNAL_PARAM_PREFIX: &str = "__";

enum LayerHandler {
    Route(RouteMethod, Arc<dyn Handler>),
    Error(Arc<dyn ErrorHandler>),
}

/// One registered handler with its path matcher
struct Layer {
    /// `None` matches every path
    matcher: Option<MatchRouter<()>>,
    handler: LayerHandler,
}

impl Layer {
    fn new(path: Option<&str>, prefix: bool, handler: LayerHandler) -> RouterResult<Self> {
        let matcher = match path {
            Some(path) => Some(Self::build_matcher(path, prefix)?),
            None => None,
        };
        Ok(Self { matcher, handler })
    }

    fn build_matcher(path: &str, prefix: bool) -> RouterResult<MatchRouter<()>> {
        let pattern = normalize_path_pattern(path);
        let mut patterns = vec![pattern.clone()];
        if prefix {
            patterns.push(format!(
                "{}/{{*{INTERNAL_PARAM_PREFIX}rest}}",
                pattern.trim_end_matches('/')
            ));
        }

        let mut matcher = MatchRouter::new();
        for p in patterns {
            matcher.insert(p.as_str(), ()).map_err(|e| {
                router_error!(ErrorCode::BadRoute, "Invalid route path '{0}': {1}", path, e)
            })?;
        }
        Ok(matcher)
    }

    /// Path parameters if the layer applies to `path`.
    ///
    /// A single trailing slash is ignored, so `/users/` matches `/users`.
    fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let Some(matcher) = &self.matcher else {
            return Some(BTreeMap::new());
        };
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };
        matcher.at(path).or_else(|_| matcher.at(trimmed)).ok().map(|matched| {
            matched
                .params
                .iter()
                .filter(|(k, _)| !k.starts_with(INTERNAL_PARAM_PREFIX))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
    }
}

/// In-process server adapter with express-like layer semantics.
///
/// Layers run in registration order. Verb-specific routes match the whole
/// path, generic (`Use`) routes match by path prefix. Matching is not strict
/// about a trailing slash. Once a handler fails,
/// only error layers run until one of them handles the request or calls
/// `next()` without an error.
#[derive(Default)]
pub struct Dispatcher {
    layers: Vec<Layer>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Run `req` through the layer chain
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let mut res = Response::default();
        let mut failure: Option<RouterError> = None;

        for layer in &self.layers {
            let Some(params) = layer.match_path(req.path()) else {
                continue;
            };

            let flow = match (&layer.handler, &failure) {
                (LayerHandler::Route(method, handler), None) if method.matches(&req.method) => {
                    req.params = params;
                    handler.handle(&mut req, &mut res).await
                }
                (LayerHandler::Error(handler), Some(err)) => {
                    req.params = params;
                    handler.handle_error(Some(err), &mut req, &mut res).await
                }
                _ => continue,
            };

            match flow {
                Flow::Handled => return res,
                Flow::Next => failure = None,
                Flow::Fail(err) => {
                    debug!("Handler failed for {} {}: {}", req.method, req.path(), err);
                    failure = Some(err);
                }
            }
        }

        match failure {
            Some(err) => {
                error!("Unhandled error for {} {}: {}", req.method, req.path(), err);
                Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            None => {
                debug!("No route matched {} {}", req.method, req.path());
                Response::error(StatusCode::NOT_FOUND, "Not Found")
            }
        }
    }
}

impl ServerAdapter for Dispatcher {
    fn add_route(
        &mut self,
        method: RouteMethod,
        path: Option<&str>,
        handler: Arc<dyn Handler>,
    ) -> RouterResult<()> {
        let prefix = method == RouteMethod::Use;
        self.layers
            .push(Layer::new(path, prefix, LayerHandler::Route(method, handler))?);
        Ok(())
    }

    fn add_error_route(&mut self, handler: Arc<dyn ErrorHandler>) -> RouterResult<()> {
        self.layers
            .push(Layer::new(None, true, LayerHandler::Error(handler))?);
        Ok(())
    }
}
