//! Tests for route registration, pattern matching and controller scanning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::Method;
use wharf::http::ResponsePayload;
use wharf::router::{
    param, resolve_route_path, Controller, HandlerEntry, RouteAnnotation, RouteOptions,
    RouteRegistry,
};
use wharf::Error;

fn registry() -> RouteRegistry {
    RouteRegistry::new()
}

#[test]
fn first_registered_route_wins() {
    let mut registry = registry();
    registry
        .get("/things/:id", |_, _| Ok(ResponsePayload::from("param")), RouteOptions::default())
        .expect("register");
    registry
        .get(
            "/things/special",
            |_, _| Ok(ResponsePayload::from("literal")),
            RouteOptions::default(),
        )
        .expect("register");

    let matched = registry
        .match_route(&Method::GET, "/things/special")
        .expect("match");
    // Registration order, not specificity: the parameterized route wins.
    assert_eq!(matched.route.pattern.raw(), "/things/:id");
    assert_eq!(param(&matched.params, "id"), Some("special"));
}

#[test]
fn method_mismatch_skips_the_route() {
    let mut registry = registry();
    registry
        .post("/submit", |_, _| Ok(ResponsePayload::None), RouteOptions::default())
        .expect("register");
    assert!(registry.match_route(&Method::GET, "/submit").is_none());
    assert!(registry.match_route(&Method::POST, "/submit").is_some());
}

#[test]
fn named_params_bind_and_empty_captures_are_absent() {
    let mut registry = registry();
    registry
        .get("/users/:id", |_, _| Ok(ResponsePayload::None), RouteOptions::default())
        .expect("register");

    let matched = registry.match_route(&Method::GET, "/users/42").expect("match");
    assert_eq!(param(&matched.params, "id"), Some("42"));

    // `/users/` arrives normalized as `/users`; the capture is absent, not "".
    let matched = registry.match_route(&Method::GET, "/users").expect("match");
    assert_eq!(param(&matched.params, "id"), None);
}

#[test]
fn cors_route_registers_exactly_one_preflight_route() {
    let mut registry = registry();
    registry
        .register(
            "/api/data",
            vec![Method::GET],
            None,
            RouteOptions {
                cors: true,
                ..RouteOptions::default()
            },
        )
        .expect("register");

    assert_eq!(registry.len(), 2);
    let matched = registry
        .match_route(&Method::OPTIONS, "/api/data")
        .expect("preflight");
    assert_eq!(matched.route.methods, vec![Method::OPTIONS]);
    let action = matched.route.action.as_ref().expect("action");
    let payload = action(
        &matched.params,
        &wharf::RequestContext::new(Method::OPTIONS, "/api/data", Default::default(), None),
    )
    .expect("invoke");
    assert!(matches!(payload, ResponsePayload::None));
}

#[test]
fn prefix_resolution() {
    assert_eq!(resolve_route_path("/api", "/users"), "/api/users");
    assert_eq!(resolve_route_path("/", "/"), "/");
    assert_eq!(resolve_route_path("/", "/users"), "/users");
    assert_eq!(resolve_route_path("/api", "/"), "/api");
    assert_eq!(resolve_route_path("/api/", "users"), "/api/users");
}

struct ApiController {
    hits: Arc<AtomicUsize>,
}

impl Controller for ApiController {
    fn name(&self) -> &'static str {
        "ApiController"
    }

    fn prefix(&self) -> &str {
        "/api"
    }

    fn handlers(&self) -> Vec<HandlerEntry> {
        let hits = Arc::clone(&self.hits);
        vec![
            HandlerEntry::action("list_users", RouteAnnotation::get("/users"), move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(ResponsePayload::from("users"))
            }),
            HandlerEntry::action("_internal", RouteAnnotation::get("/internal"), |_, _| {
                Ok(ResponsePayload::None)
            }),
        ]
    }
}

#[test]
fn controller_routes_are_mounted_under_the_prefix() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut registry = registry();
    registry
        .register_controller(&ApiController {
            hits: Arc::clone(&hits),
        })
        .expect("register");

    let matched = registry
        .match_route(&Method::GET, "/api/users")
        .expect("match");
    let action = matched.route.action.as_ref().expect("action");
    let request = wharf::RequestContext::new(Method::GET, "/api/users", Default::default(), None);
    action(&matched.params, &request).expect("invoke");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Underscore-prefixed entries never become routes.
    assert!(registry.match_route(&Method::GET, "/api/internal").is_none());
}

struct RootController;

impl Controller for RootController {
    fn name(&self) -> &'static str {
        "RootController"
    }

    fn handlers(&self) -> Vec<HandlerEntry> {
        vec![HandlerEntry::action("index", RouteAnnotation::get("/"), |_, _| {
            Ok(ResponsePayload::from("home"))
        })]
    }
}

#[test]
fn root_prefix_with_root_path_yields_root() {
    let mut registry = registry();
    registry
        .register_controller(&RootController)
        .expect("register");
    let matched = registry.match_route(&Method::GET, "/").expect("match");
    assert_eq!(matched.route.pattern.raw(), "/");
}

struct CorsController;

impl Controller for CorsController {
    fn name(&self) -> &'static str {
        "CorsController"
    }

    fn cors(&self) -> Option<bool> {
        Some(true)
    }

    fn handlers(&self) -> Vec<HandlerEntry> {
        vec![
            HandlerEntry::action("open", RouteAnnotation::get("/open"), |_, _| {
                Ok(ResponsePayload::None)
            }),
            // Method-level annotation overrides the controller default.
            HandlerEntry::action(
                "closed",
                RouteAnnotation::get("/closed").with_cors(false),
                |_, _| Ok(ResponsePayload::None),
            ),
        ]
    }
}

#[test]
fn method_level_cors_overrides_controller_level() {
    let mut registry = registry();
    registry.register_controller(&CorsController).expect("register");
    assert!(registry.match_route(&Method::OPTIONS, "/open").is_some());
    assert!(registry.match_route(&Method::OPTIONS, "/closed").is_none());
}

struct FaultyController;

impl Controller for FaultyController {
    fn name(&self) -> &'static str {
        "FaultyController"
    }

    fn handlers(&self) -> Vec<HandlerEntry> {
        vec![
            HandlerEntry::error_handler("first", |_, _| Ok(ResponsePayload::None)),
            HandlerEntry::error_handler("second", |_, _| Ok(ResponsePayload::None)),
        ]
    }
}

#[test]
fn duplicate_error_handler_fails_registration() {
    let mut registry = registry();
    let err = registry
        .register_controller(&FaultyController)
        .expect_err("must fail");
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("already been defined"));
}

#[test]
fn error_handler_is_not_a_route() {
    struct WithHandler;
    impl Controller for WithHandler {
        fn name(&self) -> &'static str {
            "WithHandler"
        }
        fn handlers(&self) -> Vec<HandlerEntry> {
            vec![HandlerEntry::error_handler("errors", |status, message| {
                Ok(ResponsePayload::from(format!("{status}: {message}")))
            })]
        }
    }

    let mut registry = registry();
    registry.register_controller(&WithHandler).expect("register");
    assert!(registry.is_empty());
    assert!(registry.error_handler().is_some());
}
