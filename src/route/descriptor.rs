//! Route descriptors and the registration-time validation that produces them

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{
    core::{
        context::{Expr, Factory, Invocable, ResolveMap},
        controller::{Action, Callback},
        error::{ErrorCode, RouterError, RouterResult},
    },
    router_error,
    utils::request::has_path_param,
};

/// Action used when neither the route nor the path names one
pub const DEFAULT_ACTION: &str = "index";

/// Path parameter overriding the controller name
pub const CONTROLLER_PARAM: &str = "controller";

/// Path parameter overriding the action name
pub const ACTION_PARAM: &str = "action";

/// HTTP verb a route is bound to; `Use` means no verb filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    All,
    #[default]
    Use,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Post => "post",
            RouteMethod::Put => "put",
            RouteMethod::Delete => "delete",
            RouteMethod::All => "all",
            RouteMethod::Use => "use",
        }
    }

    /// Whether a request with `method` passes this verb filter
    pub fn matches(&self, method: &http::Method) -> bool {
        match self {
            RouteMethod::Get => *method == http::Method::GET,
            RouteMethod::Post => *method == http::Method::POST,
            RouteMethod::Put => *method == http::Method::PUT,
            RouteMethod::Delete => *method == http::Method::DELETE,
            RouteMethod::All | RouteMethod::Use => true,
        }
    }
}

impl FromStr for RouteMethod {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(RouteMethod::Get),
            "post" => Ok(RouteMethod::Post),
            "put" => Ok(RouteMethod::Put),
            "delete" => Ok(RouteMethod::Delete),
            "all" => Ok(RouteMethod::All),
            "use" => Ok(RouteMethod::Use),
            _ => Err(router_error!(
                ErrorCode::BadRoute,
                "Unknown route method '{0}'",
                s
            )),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a gating filter
#[derive(Clone, Debug)]
pub enum FilterRef {
    /// Looked up by name through the filter registry
    Named(String),
    /// Invoked through the injector; must yield a filter
    Factory(Factory),
}

impl From<&str> for FilterRef {
    fn from(name: &str) -> Self {
        FilterRef::Named(name.to_string())
    }
}

impl From<String> for FilterRef {
    fn from(name: String) -> Self {
        FilterRef::Named(name)
    }
}

impl From<Factory> for FilterRef {
    fn from(factory: Factory) -> Self {
        FilterRef::Factory(factory)
    }
}

/// How a descriptor dispatches, decided once at registration time
#[derive(Clone, Debug)]
pub enum RouteAction {
    Invocable(Invocable),
    Callback(Callback),
    /// Resolved per request; `None` fields defer to path parameters
    Controller {
        controller: Option<String>,
        action: Option<String>,
    },
    Redirect(String),
}

/// Object-form route declaration
#[derive(Clone, Debug, Default)]
pub struct RouteConfig {
    pub method: Option<RouteMethod>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub handler: Option<Action>,
    pub redirect_to: Option<String>,
    pub filter: Option<FilterRef>,
    pub resolve: Option<ResolveMap>,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route that only redirects
    pub fn redirect(target: impl Into<String>) -> Self {
        Self {
            redirect_to: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: RouteMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn controller(mut self, name: impl Into<String>) -> Self {
        self.controller = Some(name.into());
        self
    }

    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    /// Dispatch to an invocable or a plain callback instead of a controller
    pub fn handler(mut self, action: impl Into<Action>) -> Self {
        self.handler = Some(action.into());
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

/// Anything accepted by the registration API
#[derive(Clone, Debug)]
pub enum RouteSpec {
    Config(RouteConfig),
    Action(Action),
    /// Loosely-typed declaration, e.g. parsed from JSON
    Dynamic(JsonValue),
}

impl From<RouteConfig> for RouteSpec {
    fn from(config: RouteConfig) -> Self {
        RouteSpec::Config(config)
    }
}

impl From<Action> for RouteSpec {
    fn from(action: Action) -> Self {
        RouteSpec::Action(action)
    }
}

impl From<Invocable> for RouteSpec {
    fn from(invocable: Invocable) -> Self {
        RouteSpec::Action(Action::Invocable(invocable))
    }
}

impl From<Callback> for RouteSpec {
    fn from(callback: Callback) -> Self {
        RouteSpec::Action(Action::Callback(callback))
    }
}

impl From<JsonValue> for RouteSpec {
    fn from(value: JsonValue) -> Self {
        RouteSpec::Dynamic(value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DynamicRoute {
    method: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    #[serde(alias = "redirect_to")]
    redirect_to: Option<String>,
    filter: Option<String>,
    #[serde(default)]
    resolve: BTreeMap<String, String>,
}

/// Immutable dispatch rule for one route
#[derive(Clone, Debug)]
pub struct RouteDescriptor {
    path: Option<String>,
    method: RouteMethod,
    action: RouteAction,
    filter: Option<FilterRef>,
    resolve: Option<ResolveMap>,
}

impl RouteDescriptor {
    /// Validate `spec` and build a descriptor.
    ///
    /// `method` overrides whatever the route declares; without either the
    /// route is generic middleware (`Use`).
    pub fn build(
        path: Option<&str>,
        method: Option<RouteMethod>,
        spec: RouteSpec,
    ) -> RouterResult<Self> {
        match spec {
            RouteSpec::Config(config) => Self::from_config(path, method, config),
            RouteSpec::Dynamic(value) => {
                let config = parse_dynamic(path, value)?;
                Self::from_config(path, method, config)
            }
            RouteSpec::Action(action) => Ok(Self {
                path: path.map(str::to_string),
                method: method.unwrap_or_default(),
                action: action.into(),
                filter: None,
                resolve: None,
            }),
        }
    }

    fn from_config(
        path: Option<&str>,
        method: Option<RouteMethod>,
        config: RouteConfig,
    ) -> RouterResult<Self> {
        let display = path.unwrap_or("*");
        let method = method.or(config.method).unwrap_or_default();
        let controller = config.controller.filter(|s| !s.is_empty());
        let action_name = config.action.filter(|s| !s.is_empty());

        let action = if let Some(target) = config.redirect_to {
            if target.is_empty() {
                return Err(router_error!(
                    ErrorCode::BadRoute,
                    "Empty redirect target for route '{0}'",
                    display
                ));
            }
            RouteAction::Redirect(target)
        } else if let Some(handler) = config.handler {
            handler.into()
        } else {
            let controller_param = path.is_some_and(|p| has_path_param(p, CONTROLLER_PARAM));
            let action_param = path.is_some_and(|p| has_path_param(p, ACTION_PARAM));

            if controller.is_none() && action_name.is_none() && !controller_param {
                return Err(router_error!(
                    ErrorCode::BadRoute,
                    "Invalid route provided for '{0}', expected a redirect, an action or a controller",
                    display
                ));
            }
            if controller.is_none() && !controller_param {
                return Err(router_error!(
                    ErrorCode::BadRoute,
                    "No controller specified for route '{0}'.",
                    display
                ));
            }

            RouteAction::Controller {
                controller,
                action: action_name.or_else(|| (!action_param).then(|| DEFAULT_ACTION.to_string())),
            }
        };

        Ok(Self {
            path: path.map(str::to_string),
            method,
            action,
            filter: config.filter,
            resolve: config.resolve.filter(|map| !map.is_empty()),
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Path for messages and logs; `*` for routes on every path
    pub fn display_path(&self) -> &str {
        self.path.as_deref().unwrap_or("*")
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn action(&self) -> &RouteAction {
        &self.action
    }

    pub fn filter(&self) -> Option<&FilterRef> {
        self.filter.as_ref()
    }

    pub fn resolve(&self) -> Option<&ResolveMap> {
        self.resolve.as_ref()
    }

    /// A plain callback with nothing to resolve can skip the pipeline
    pub fn plain_callback(&self) -> Option<&Callback> {
        match &self.action {
            RouteAction::Callback(callback) if self.resolve.is_none() => Some(callback),
            _ => None,
        }
    }
}

impl From<Action> for RouteAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Invocable(invocable) => RouteAction::Invocable(invocable),
            Action::Callback(callback) => RouteAction::Callback(callback),
        }
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn parse_dynamic(path: Option<&str>, value: JsonValue) -> RouterResult<RouteConfig> {
    let display = path.unwrap_or("*");
    if !value.is_object() {
        return Err(router_error!(
            ErrorCode::BadRoute,
            "Invalid route provided for '{0}', expected an object, array or function, got '{1}'",
            display,
            json_type(&value)
        ));
    }

    let route: DynamicRoute = serde_json::from_value(value).map_err(|e| {
        router_error!(
            ErrorCode::BadRoute,
            "Invalid route provided for '{0}': {1}",
            display,
            e
        )
    })?;

    let resolve = route
        .resolve
        .into_iter()
        .fold(ResolveMap::new(), |map, (name, service)| map.with(name, service));

    Ok(RouteConfig {
        method: route
            .method
            .as_deref()
            .map(str::parse::<RouteMethod>)
            .transpose()?,
        controller: route.controller,
        action: route.action,
        handler: None,
        redirect_to: route.redirect_to,
        filter: route.filter.map(FilterRef::Named),
        resolve: Some(resolve),
    })
}
