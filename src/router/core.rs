//! Route registry - hot path for request routing.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::http::{RequestContext, ResponsePayload};
use crate::metadata::{keys, MetadataStore, SubjectId};
use crate::middleware::Middleware;
use crate::router::controller::{Action, Controller, ErrorAction, HandlerKind, RouteAnnotation};
use crate::router::pattern::{PathParams, PathPattern};

/// Per-route options resolved at registration time.
#[derive(Clone, Default)]
pub struct RouteOptions {
    pub cookies: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cors: bool,
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Template name; a route with a view and no action short-circuits to
    /// rendering it.
    pub view: Option<String>,
    /// Status override used when the action does not set one.
    pub status: Option<StatusCode>,
}

/// An immutable registered route. Lives in the registry's append-only list
/// for the process lifetime.
pub struct Route {
    pub pattern: PathPattern,
    pub methods: Vec<Method>,
    pub action: Option<Action>,
    pub options: RouteOptions,
}

/// Result of matching a request against the registry.
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: PathParams,
}

/// Join a controller prefix and a route path with exactly one `/` boundary.
///
/// A `/` prefix leaves the path untouched; a literal `/` path is dropped
/// when the prefix already supplies it.
#[must_use]
pub fn resolve_route_path(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        return path.to_string();
    }
    let base = prefix.trim_end_matches('/');
    if path == "/" || path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// The full method set used by `any` and `except`, WebDAV verbs included.
fn all_methods() -> Vec<Method> {
    let mut methods = vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
    ];
    for verb in [
        "COPY",
        "LOCK",
        "MKCOL",
        "MOVE",
        "PROPFIND",
        "PROPPATCH",
        "SEARCH",
        "UNLOCK",
    ] {
        methods.push(Method::from_bytes(verb.as_bytes()).expect("valid method"));
    }
    methods
}

/// Ordered list of declared routes plus the single optional fallback error
/// handler.
///
/// Routes are matched in registration order; the first route whose method
/// set contains the request method and whose pattern matches the path wins.
#[derive(Default)]
pub struct RouteRegistry {
    routes: Vec<Route>,
    meta: MetadataStore,
    error_handler: Option<ErrorAction>,
}

impl RouteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. A route declaring `cors: true` first auto-registers
    /// an `OPTIONS` route at the same path returning empty content (CORS
    /// preflight).
    pub fn register(
        &mut self,
        path: &str,
        methods: Vec<Method>,
        action: Option<Action>,
        options: RouteOptions,
    ) -> Result<(), Error> {
        if options.cors {
            let preflight: Action = Arc::new(|_, _| Ok(ResponsePayload::None));
            self.register(
                path,
                vec![Method::OPTIONS],
                Some(preflight),
                RouteOptions::default(),
            )?;
        }

        let pattern = PathPattern::compile(path)?;
        info!(
            path = %pattern.raw(),
            methods = ?methods,
            routes_count = self.routes.len() + 1,
            "Route registered"
        );
        self.routes.push(Route {
            pattern,
            methods,
            action,
            options,
        });
        Ok(())
    }

    /// Match a request in registration order.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        debug!(method = %method, path = %path, "Route match attempt");
        for route in &self.routes {
            if !route.methods.contains(method) {
                continue;
            }
            if let Some(params) = route.pattern.matches(path) {
                info!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.pattern.raw(),
                    "Route matched"
                );
                return Some(RouteMatch { route, params });
            }
        }
        warn!(method = %method, path = %path, "No route matched");
        None
    }

    /// Register a controller's handler table.
    ///
    /// Declare phase: every handler gets a metadata subject carrying its
    /// route annotation (or the error-handler flag); the controller gets a
    /// subject carrying prefix/CORS/middleware. Register phase: the
    /// annotations are read back from the store and turned into routes,
    /// with method-level values overriding controller-level ones.
    pub fn register_controller(&mut self, controller: &dyn Controller) -> Result<(), Error> {
        // Declare: attach annotations to fresh subjects.
        let class = self.meta.subject(controller.name());
        self.meta
            .define(keys::PREFIX, controller.prefix().to_string(), class);
        if let Some(cors) = controller.cors() {
            self.meta.define(keys::CORS, cors, class);
        }
        if let Some(middleware) = controller.middleware() {
            self.meta.define(keys::MIDDLEWARE, middleware, class);
        }

        let mut subjects: Vec<SubjectId> = Vec::new();
        for entry in controller.handlers() {
            if entry.name.starts_with('_') {
                continue;
            }
            let subject = self
                .meta
                .subject(format!("{}::{}", controller.name(), entry.name));
            match entry.kind {
                HandlerKind::ErrorHandler(handler) => {
                    self.meta.define(keys::HTTP_ERROR_HANDLER, handler, subject);
                }
                HandlerKind::Action { annotation, action } => {
                    self.meta.define(keys::ROUTE, annotation, subject);
                    self.meta.define(keys::ACTION, action, subject);
                }
            }
            subjects.push(subject);
        }

        // Register: consume the annotations.
        for subject in subjects {
            if let Some(handler) = self.meta.get::<ErrorAction>(keys::HTTP_ERROR_HANDLER, subject) {
                if self.error_handler.is_some() {
                    return Err(Error::configuration(
                        "route error handler has already been defined",
                    ));
                }
                self.error_handler = Some(Arc::clone(handler));
                continue;
            }

            let annotation = self
                .meta
                .get::<RouteAnnotation>(keys::ROUTE, subject)
                .cloned()
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "handler '{}' carries no route annotation",
                        self.meta.label(subject)
                    ))
                })?;
            let action = self
                .meta
                .get::<Action>(keys::ACTION, subject)
                .cloned()
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "handler '{}' carries no action",
                        self.meta.label(subject)
                    ))
                })?;

            let prefix = self
                .meta
                .get::<String>(keys::PREFIX, class)
                .cloned()
                .unwrap_or_else(|| "/".to_string());
            let path = resolve_route_path(&prefix, &annotation.path);

            let cors = annotation
                .cors
                .or_else(|| self.meta.get::<bool>(keys::CORS, class).copied())
                .unwrap_or(false);
            let middleware = annotation
                .middleware
                .clone()
                .or_else(|| {
                    self.meta
                        .get::<Vec<Arc<dyn Middleware>>>(keys::MIDDLEWARE, class)
                        .cloned()
                })
                .unwrap_or_default();

            self.register(
                &path,
                annotation.methods.clone(),
                Some(action),
                RouteOptions {
                    cookies: annotation.cookies.clone(),
                    headers: annotation.headers.clone(),
                    cors,
                    middleware,
                    view: annotation.view.clone(),
                    status: annotation.status,
                },
            )?;
        }
        Ok(())
    }

    /// Install the process-wide fallback error handler directly.
    pub fn set_error_handler(&mut self, handler: ErrorAction) -> Result<(), Error> {
        if self.error_handler.is_some() {
            return Err(Error::configuration(
                "route error handler has already been defined",
            ));
        }
        self.error_handler = Some(handler);
        Ok(())
    }

    #[must_use]
    pub fn error_handler(&self) -> Option<&ErrorAction> {
        self.error_handler.as_ref()
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // Verb helpers. Thin wrappers over `register`, mirroring the annotation
    // constructors for anonymous routes.

    pub fn methods<F>(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        action: F,
        options: RouteOptions,
    ) -> Result<(), Error>
    where
        F: Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error>
            + Send
            + Sync
            + 'static,
    {
        self.register(path, methods, Some(Arc::new(action)), options)
    }

    pub fn any<F>(&mut self, path: &str, action: F, options: RouteOptions) -> Result<(), Error>
    where
        F: Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error>
            + Send
            + Sync
            + 'static,
    {
        self.methods(all_methods(), path, action, options)
    }

    pub fn except<F>(
        &mut self,
        excluded: &[Method],
        path: &str,
        action: F,
        options: RouteOptions,
    ) -> Result<(), Error>
    where
        F: Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error>
            + Send
            + Sync
            + 'static,
    {
        let methods = all_methods()
            .into_iter()
            .filter(|m| !excluded.contains(m))
            .collect();
        self.methods(methods, path, action, options)
    }
}

/// One helper per verb, `registry.get("/path", action, options)` style.
/// WebDAV verbs go through `Method::from_bytes` since `http` has no
/// constants for them.
macro_rules! verb_helpers {
    ($($(#[$meta:meta])* $name:ident => $verb:expr;)+) => {
        impl RouteRegistry {
            $(
                $(#[$meta])*
                pub fn $name<F>(
                    &mut self,
                    path: &str,
                    action: F,
                    options: RouteOptions,
                ) -> Result<(), Error>
                where
                    F: Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error>
                        + Send
                        + Sync
                        + 'static,
                {
                    self.methods(vec![$verb], path, action, options)
                }
            )+
        }
    };
}

fn extension_method(verb: &'static str) -> Method {
    Method::from_bytes(verb.as_bytes()).expect("valid method")
}

verb_helpers! {
    get => Method::GET;
    post => Method::POST;
    put => Method::PUT;
    patch => Method::PATCH;
    delete => Method::DELETE;
    head => Method::HEAD;
    options => Method::OPTIONS;
    trace => Method::TRACE;
    copy => extension_method("COPY");
    lock => extension_method("LOCK");
    mkcol => extension_method("MKCOL");
    /// `MOVE`; raw identifier since `move` is a keyword.
    r#move => extension_method("MOVE");
    propfind => extension_method("PROPFIND");
    proppatch => extension_method("PROPPATCH");
    search => extension_method("SEARCH");
    unlock => extension_method("UNLOCK");
}
