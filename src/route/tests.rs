//! End-to-end tests: registry, compiler, pipeline and dispatcher together

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::json;

use super::*;
use crate::{
    config::RoutesConfig,
    core::{
        container::{Collaborators, Container},
        context::{Component, Factory, Invocable},
        controller::{Callback, Controller},
        error::{ErrorCode, RouterError, RouterResult},
        traits::{error_handler_fn, filter_fn, handler_fn, Filter, Flow},
    },
    server::Dispatcher,
    utils::{Request, Response},
};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn container() -> Container {
    let container = Container::new();
    container.register_controller(
        Controller::new("Users")
            .action(
                "list",
                Callback::Standard(handler_fn(|_req, res| {
                    res.text("ok");
                    Flow::Handled
                })),
            )
            .action(
                "create",
                Callback::Standard(handler_fn(|_req, res| {
                    res.send(StatusCode::CREATED, "created");
                    Flow::Handled
                })),
            ),
    );
    container
}

fn build(registry: &RouteRegistry, container: Container) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    compile(
        registry,
        &mut dispatcher,
        Arc::new(Collaborators::from_container(Arc::new(container))),
    )
    .unwrap();
    dispatcher
}

fn request(method: Method, path: &str) -> Request {
    Request::new(method, path.parse().unwrap())
}

#[tokio::test]
async fn test_controller_route() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .get("/users", RouteConfig::new().controller("Users").action("list"))
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body_str(), Some("ok"));
}

#[tokio::test]
async fn test_compile_twice_binds_once() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .get("/users", RouteConfig::new().controller("Users").action("list"))
        .unwrap()
        .otherwise("/missing")
        .unwrap();

    let mut dispatcher = Dispatcher::new();
    let collaborators = Arc::new(Collaborators::from_container(Arc::new(container())));
    let first = compile(&registry, &mut dispatcher, collaborators.clone()).unwrap();
    let second = compile(&registry, &mut dispatcher, collaborators).unwrap();

    assert!(!first.skipped);
    assert!(second.skipped);
    assert_eq!(dispatcher.layer_count(), 2);
}

#[tokio::test]
async fn test_same_route_keeps_registration_order() {
    init_log();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let first = calls.clone();
    let second = calls.clone();
    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/x",
            Callback::Standard(handler_fn(move |_req, _res| {
                first.lock().unwrap().push(1);
                Flow::Next
            })),
        )
        .unwrap()
        .get(
            "/x",
            Callback::Standard(handler_fn(move |_req, res| {
                second.lock().unwrap().push(2);
                res.text("second");
                Flow::Handled
            })),
        )
        .unwrap();
    let dispatcher = build(&registry, Container::new());

    let res = dispatcher.dispatch(request(Method::GET, "/x")).await;
    assert_eq!(res.body_str(), Some("second"));
    assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_otherwise_only_when_unmatched() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .otherwise("/missing")
        .unwrap()
        .get("/users", RouteConfig::new().controller("Users").action("list"))
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.body_str(), Some("ok"));

    let res = dispatcher.dispatch(request(Method::GET, "/nowhere")).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/missing"));
}

#[tokio::test]
async fn test_missing_action_falls_through_to_otherwise() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .get("/users", RouteConfig::new().controller("Users").action("archive"))
        .unwrap()
        .otherwise("/missing")
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.location(), Some("/missing"));
}

#[tokio::test]
async fn test_error_routes_only_on_failure() {
    init_log();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let mut registry = RouteRegistry::new();
    registry
        .get("/ghost", RouteConfig::new().controller("Ghost"))
        .unwrap()
        .get("/users", RouteConfig::new().controller("Users").action("list"))
        .unwrap()
        .error(Callback::Error(error_handler_fn(move |err, _req, res| {
            recorder
                .lock()
                .unwrap()
                .push(err.and_then(RouterError::code));
            res.send(StatusCode::SERVICE_UNAVAILABLE, "handled");
            Flow::Handled
        })))
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.body_str(), Some("ok"));
    assert!(seen.lock().unwrap().is_empty());

    let res = dispatcher.dispatch(request(Method::GET, "/ghost")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(*seen.lock().unwrap(), vec![Some(ErrorCode::NoController)]);
}

#[tokio::test]
async fn test_controller_error_route() {
    init_log();
    let container = container();
    container.register_controller(Controller::new("Errors").action(
        "index",
        Callback::Error(error_handler_fn(|err, _req, res| {
            let message = err.map(|e| e.message().to_string()).unwrap_or_default();
            res.send(StatusCode::INTERNAL_SERVER_ERROR, message);
            Flow::Handled
        })),
    ));

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/fail",
            Callback::Standard(handler_fn(|_req, _res| {
                Flow::Fail(RouterError::handler("exploded"))
            })),
        )
        .unwrap()
        .error(RouteConfig::new().controller("Errors"))
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/fail")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body_str(), Some("exploded"));
}

#[tokio::test]
async fn test_resource_dispatch() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .resource(
            "/users",
            ResourceConfig::new("Users")
                .action(RouteMethod::Get, "list")
                .action(RouteMethod::Post, "create"),
        )
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.body_str(), Some("ok"));

    let res = dispatcher.dispatch(request(Method::POST, "/users")).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = dispatcher.dispatch(request(Method::PUT, "/users")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filter_blocks_invocation() {
    init_log();
    let invoked = Arc::new(Mutex::new(false));
    let flag = invoked.clone();

    let container = Container::new();
    container
        .register_controller(Controller::new("C").action(
            "view",
            Callback::Standard(handler_fn(move |_req, res| {
                *flag.lock().unwrap() = true;
                res.text("secret");
                Flow::Handled
            })),
        ))
        .register_filter(
            "auth",
            filter_fn(|_req, res| {
                res.send(StatusCode::UNAUTHORIZED, "denied");
                Ok(true)
            }),
        );

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/secure",
            RouteConfig::new().controller("C").action("view").filter("auth"),
        )
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/secure")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(!*invoked.lock().unwrap());
}

#[tokio::test]
async fn test_filter_does_not_gate_invocables() {
    init_log();
    let container = Container::new();
    container.register_filter(
        "auth",
        filter_fn(|_req, res| {
            res.send(StatusCode::UNAUTHORIZED, "denied");
            Ok(true)
        }),
    );

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/inv",
            RouteConfig::new()
                .handler(Invocable::from_fn(Vec::<String>::new(), |inv| {
                    inv.res.text("invoked");
                    Flow::Handled
                }))
                .filter("auth"),
        )
        .unwrap()
        .get(
            "/cb",
            RouteConfig::new()
                .handler(Callback::Standard(handler_fn(|_req, res| {
                    res.text("called");
                    Flow::Handled
                })))
                .filter("auth"),
        )
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/inv")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body_str(), Some("invoked"));

    let res = dispatcher.dispatch(request(Method::GET, "/cb")).await;
    assert_eq!(res.body_str(), Some("called"));
}

/// Filter that settles only after a delay, recording when it finished
struct SlowFilter {
    handled: bool,
    events: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Filter for SlowFilter {
    async fn filter(&self, _req: &mut Request, res: &mut Response) -> RouterResult<bool> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.events.lock().unwrap().push("filter");
        if self.handled {
            res.send(StatusCode::FORBIDDEN, "blocked");
        }
        Ok(self.handled)
    }
}

#[tokio::test]
async fn test_async_filter_settles_before_invocation() {
    init_log();
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorder = events.clone();

    let container = Container::new();
    container
        .register_controller(Controller::new("C").action(
            "view",
            Callback::Standard(handler_fn(move |_req, res| {
                recorder.lock().unwrap().push("action");
                res.text("viewed");
                Flow::Handled
            })),
        ))
        .register_filter(
            "slowAllow",
            Arc::new(SlowFilter {
                handled: false,
                events: events.clone(),
            }),
        )
        .register_filter(
            "slowDeny",
            Arc::new(SlowFilter {
                handled: true,
                events: events.clone(),
            }),
        );

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/open",
            RouteConfig::new().controller("C").action("view").filter("slowAllow"),
        )
        .unwrap()
        .get(
            "/closed",
            RouteConfig::new().controller("C").action("view").filter("slowDeny"),
        )
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/open")).await;
    assert_eq!(res.body_str(), Some("viewed"));
    assert_eq!(*events.lock().unwrap(), vec!["filter", "action"]);

    events.lock().unwrap().clear();
    let res = dispatcher.dispatch(request(Method::GET, "/closed")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(*events.lock().unwrap(), vec!["filter"]);
}

#[tokio::test]
async fn test_async_factory_filter() {
    init_log();
    let container = container();
    container.value("allowed", false);

    let factory = Factory::new(["allowed"], |args| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let allowed = args.get::<bool>("allowed").copied().unwrap_or_default();
        Ok(Component::Filter(filter_fn(move |_req, res| {
            if !allowed {
                res.send(StatusCode::FORBIDDEN, "blocked");
            }
            Ok(!allowed)
        })))
    });

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/users",
            RouteConfig::new().controller("Users").action("list").filter(factory),
        )
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_otherwise_with_declared_method() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .otherwise(RouteConfig::redirect("/m").method(RouteMethod::Post))
        .unwrap();
    let dispatcher = build(&registry, Container::new());

    let res = dispatcher.dispatch(request(Method::GET, "/nowhere")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = dispatcher.dispatch(request(Method::POST, "/nowhere")).await;
    assert_eq!(res.location(), Some("/m"));
}

#[tokio::test]
async fn test_trailing_slash_matches() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry
        .get("/users", RouteConfig::new().controller("Users").action("list"))
        .unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users/")).await;
    assert_eq!(res.body_str(), Some("ok"));
}

#[tokio::test]
async fn test_path_params_select_controller() {
    init_log();
    let mut registry = RouteRegistry::new();
    registry.get("/:controller/:action", json!({})).unwrap();
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/Users/list")).await;
    assert_eq!(res.body_str(), Some("ok"));

    let res = dispatcher.dispatch(request(Method::GET, "/Nobody/list")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_async_resolve_in_order() {
    init_log();
    let container = Container::new();
    container.value("base", 20u32);

    let mut registry = RouteRegistry::new();
    registry
        .get(
            "/answer",
            RouteConfig::new()
                .handler(Invocable::from_fn(["answer"], |inv| {
                    let answer = inv.args.get::<u32>("answer").copied().unwrap_or_default();
                    inv.res.text(answer.to_string());
                    Flow::Handled
                }))
                .resolve(
                    "half",
                    Factory::new(["base"], |args| async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        let base = args.get::<u32>("base").copied().unwrap_or_default();
                        Ok(Component::value(base + 1))
                    }),
                )
                .resolve(
                    "answer",
                    Factory::sync(["half"], |args| {
                        let half = args.get::<u32>("half").copied().unwrap_or_default();
                        Ok(Component::value(half * 2))
                    }),
                ),
        )
        .unwrap();
    let dispatcher = build(&registry, container);

    let res = dispatcher.dispatch(request(Method::GET, "/answer")).await;
    assert_eq!(res.body_str(), Some("42"));
}

#[test]
fn test_empty_route_rejected_at_registration() {
    init_log();
    let mut registry = RouteRegistry::new();
    let err = registry.when(Some("/x"), json!({})).err().unwrap();
    assert_eq!(err.code(), Some(ErrorCode::BadRoute));
    assert!(err.message().starts_with("[$router:badrt]"));
}

#[tokio::test]
async fn test_routes_from_config() {
    init_log();
    let config = RoutesConfig::from_yaml(
        r#"
routes:
  - path: /users
    method: get
    controller: Users
    action: list
  - path: /old-users
    redirect_to: /users
resources:
  - path: /accounts
    controller: Users
    actions:
      post: create
otherwise: /missing
        "#,
    )
    .unwrap();

    let mut registry = RouteRegistry::new();
    registry.load(&config).unwrap();
    assert_eq!(
        registry.get_stats(),
        RouteStats {
            standard_count: 3,
            error_count: 0,
            has_otherwise: true,
        }
    );
    let dispatcher = build(&registry, container());

    let res = dispatcher.dispatch(request(Method::GET, "/users")).await;
    assert_eq!(res.body_str(), Some("ok"));

    let res = dispatcher.dispatch(request(Method::POST, "/old-users")).await;
    assert_eq!(res.location(), Some("/users"));

    let res = dispatcher.dispatch(request(Method::POST, "/accounts")).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = dispatcher.dispatch(request(Method::DELETE, "/accounts")).await;
    assert_eq!(res.location(), Some("/missing"));
}
