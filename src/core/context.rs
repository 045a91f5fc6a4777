//! Request-scoped values and DI-invocable forms
//!
//! This module provides [`Locals`], the per-request name/value map the
//! injector resolves dependencies from, together with the two injectable
//! shapes the router understands: [`Invocable`] actions and [`Factory`]
//! expressions.

use std::{any::Any, collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};

use super::{
    controller::Controller,
    error::{RouterError, RouterResult},
    traits::{Filter, Flow},
};
use crate::utils::{Request, Response};

/// Type-erased injectable value
pub type Value = Arc<dyn Any + Send + Sync>;

/// Name of the request snapshot in request-scoped locals
pub const LOCAL_REQ: &str = "req";
/// Name of the in-flight error in request-scoped locals
pub const LOCAL_ERR: &str = "err";

/// Something the injector can hand out by name
#[derive(Clone)]
pub enum Component {
    /// Plain value (service, configuration, resolved data)
    Value(Value),
    /// A request filter
    Filter(Arc<dyn Filter>),
    /// A controller
    Controller(Arc<Controller>),
}

impl Component {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Component::Value(Arc::new(value))
    }

    /// Erase the component so it can be injected as an argument.
    ///
    /// Filters and controllers are injected as `Arc<dyn Filter>` and
    /// `Arc<Controller>` respectively.
    pub fn into_value(self) -> Value {
        match self {
            Component::Value(value) => value,
            Component::Filter(filter) => Arc::new(filter),
            Component::Controller(controller) => Arc::new(controller),
        }
    }

    pub fn as_filter(&self) -> Option<Arc<dyn Filter>> {
        match self {
            Component::Filter(filter) => Some(filter.clone()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Component::Value(_) => "value",
            Component::Filter(_) => "filter",
            Component::Controller(_) => "controller",
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.kind())
    }
}

/// Named values visible to the injector for one request
#[derive(Clone, Default)]
pub struct Locals {
    vars: HashMap<String, Value>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{err, req}` locals every pipeline starts from.
    pub fn request_scoped(req: &Request, err: Option<&RouterError>) -> Self {
        let mut locals = Self::new();
        locals.insert(LOCAL_REQ, req.clone());
        if let Some(err) = err {
            locals.insert(LOCAL_ERR, err.clone());
        }
        locals
    }

    /// Store a typed value
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.vars.insert(key.into(), Arc::new(value));
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    /// Get a typed reference
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.vars.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.vars.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("Locals").field("keys", &keys).finish()
    }
}

/// Arguments resolved for an invocation, in declaration order
#[derive(Clone, Default)]
pub struct Args {
    values: Vec<(String, Value)>,
}

impl Args {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    /// Typed argument by dependency name
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.downcast_ref::<T>())
    }

    /// Typed argument by position
    pub fn at<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(|(_, v)| v.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.values.iter().map(|(n, _)| n).collect();
        f.debug_struct("Args").field("names", &names).finish()
    }
}

/// Everything an invocable action receives when the injector calls it
pub struct Invocation<'a> {
    pub err: Option<&'a RouterError>,
    pub req: &'a mut Request,
    pub res: &'a mut Response,
    pub args: Args,
}

/// Body of a DI-invocable action
#[async_trait]
pub trait InvokeFn: Send + Sync {
    async fn call(&self, invocation: Invocation<'_>) -> Flow;
}

struct SyncInvokeFn<F>(F);

#[async_trait]
impl<F> InvokeFn for SyncInvokeFn<F>
where
    F: Fn(Invocation<'_>) -> Flow + Send + Sync,
{
    async fn call(&self, invocation: Invocation<'_>) -> Flow {
        (self.0)(invocation)
    }
}

/// A DI-invocable action: dependency names plus a body the injector calls.
#[derive(Clone)]
pub struct Invocable {
    deps: Vec<String>,
    body: Arc<dyn InvokeFn>,
}

impl Invocable {
    pub fn new<I, S>(deps: I, body: impl InvokeFn + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deps: deps.into_iter().map(Into::into).collect(),
            body: Arc::new(body),
        }
    }

    /// Invocable with a synchronous body
    pub fn from_fn<I, S, F>(deps: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation<'_>) -> Flow + Send + Sync + 'static,
    {
        Self::new(deps, SyncInvokeFn(f))
    }

    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    pub async fn call(&self, invocation: Invocation<'_>) -> Flow {
        self.body.call(invocation).await
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocable").field("deps", &self.deps).finish()
    }
}

type BuildFn = dyn Fn(Args) -> BoxFuture<'static, RouterResult<Component>> + Send + Sync;

/// A DI expression in function form: the injector resolves `deps` and the
/// factory builds a component from them, possibly asynchronously.
#[derive(Clone)]
pub struct Factory {
    deps: Vec<String>,
    build: Arc<BuildFn>,
}

impl Factory {
    pub fn new<I, S, F, Fut>(deps: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<Component>> + Send + 'static,
    {
        Self {
            deps: deps.into_iter().map(Into::into).collect(),
            build: Arc::new(move |args| f(args).boxed()),
        }
    }

    /// Factory whose result is available immediately
    pub fn sync<I, S, F>(deps: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Args) -> RouterResult<Component> + Send + Sync + 'static,
    {
        Self::new(deps, move |args| futures::future::ready(f(args)))
    }

    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    pub async fn build(&self, args: Args) -> RouterResult<Component> {
        (self.build)(args).await
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("deps", &self.deps).finish()
    }
}

/// A DI-resolvable expression
#[derive(Clone, Debug)]
pub enum Expr {
    /// Named component looked up through the injector
    Service(String),
    /// Factory invoked by the injector
    Factory(Factory),
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::Service(name.to_string())
    }
}

impl From<String> for Expr {
    fn from(name: String) -> Self {
        Expr::Service(name)
    }
}

impl From<Factory> for Expr {
    fn from(factory: Factory) -> Self {
        Expr::Factory(factory)
    }
}

/// Ordered mapping of local names to DI expressions
#[derive(Clone, Debug, Default)]
pub struct ResolveMap {
    entries: Vec<(String, Expr)>,
}

impl ResolveMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing an earlier one with the same name
    pub fn with(mut self, name: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.insert(name, expr);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, expr: impl Into<Expr>) {
        let name = name.into();
        let expr = expr.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = expr,
            None => self.entries.push((name, expr)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_locals_typed_access() {
        let mut locals = Locals::new();
        locals.insert("answer", 42u32);
        locals.insert("name", "users".to_string());

        assert_eq!(locals.get::<u32>("answer"), Some(&42));
        assert_eq!(locals.get::<String>("name").map(String::as_str), Some("users"));
        assert!(locals.get::<String>("answer").is_none());
        assert!(locals.contains("name"));
        assert!(!locals.contains("missing"));
    }

    #[test]
    fn test_request_scoped_locals() {
        let req = Request::new(Method::GET, "/users".parse().unwrap());
        let locals = Locals::request_scoped(&req, None);
        assert_eq!(locals.get::<Request>(LOCAL_REQ).unwrap().path(), "/users");
        assert!(!locals.contains(LOCAL_ERR));

        let err = RouterError::handler("boom");
        let locals = Locals::request_scoped(&req, Some(&err));
        assert_eq!(locals.get::<RouterError>(LOCAL_ERR).unwrap().message(), "boom");
    }

    #[test]
    fn test_args_by_name_and_position() {
        let mut args = Args::with_capacity(2);
        args.push("db", Arc::new("postgres".to_string()) as Value);
        args.push("limit", Arc::new(10usize) as Value);

        assert_eq!(args.get::<String>("db").map(String::as_str), Some("postgres"));
        assert_eq!(args.at::<usize>(1), Some(&10));
        assert!(args.at::<usize>(2).is_none());
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_resolve_map_replaces_by_name() {
        let map = ResolveMap::new()
            .with("user", "userService")
            .with("config", "appConfig")
            .with("user", "otherService");

        let names: Vec<_> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["user", "config"]);
        assert!(matches!(map.iter().next().unwrap().1, Expr::Service(s) if s == "otherService"));
    }

    #[tokio::test]
    async fn test_factory_builds_component() {
        let factory = Factory::sync(["base"], |args| {
            let base = args.get::<u32>("base").copied().unwrap_or_default();
            Ok(Component::value(base * 2))
        });
        assert_eq!(factory.dependencies().to_vec(), vec!["base".to_string()]);

        let mut args = Args::default();
        args.push("base", Arc::new(21u32) as Value);
        let value = factory.build(args).await.unwrap().into_value();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
    }
}
