//! Controller contract and route annotations.
//!
//! A controller exposes an explicit handler table, with no runtime reflection
//! over members. Each entry pairs a bound action with a [`RouteAnnotation`];
//! at registration time the annotations are written into the
//! [`MetadataStore`](crate::metadata::MetadataStore) and read back by the
//! registry, keeping "declare" and "register" as two separate phases.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};

use crate::error::Error;
use crate::http::{RequestContext, ResponsePayload};
use crate::middleware::Middleware;
use crate::router::pattern::PathParams;

/// A bound route action: `(params, request) -> payload`.
pub type Action =
    Arc<dyn Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error> + Send + Sync>;

/// The designated fallback error handler: `(status, message) -> payload`.
pub type ErrorAction =
    Arc<dyn Fn(StatusCode, &str) -> Result<ResponsePayload, Error> + Send + Sync>;

/// Everything a route declares except its action.
///
/// Attached to a handler subject in the metadata store before the registry
/// consumes it. Method-level values override controller-level ones, which
/// override the defaults.
#[derive(Clone, Default)]
pub struct RouteAnnotation {
    pub methods: Vec<Method>,
    pub path: String,
    pub cookies: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cors: Option<bool>,
    pub middleware: Option<Vec<Arc<dyn Middleware>>>,
    pub view: Option<String>,
    pub status: Option<StatusCode>,
}

impl RouteAnnotation {
    #[must_use]
    pub fn new(methods: Vec<Method>, path: impl Into<String>) -> Self {
        Self {
            methods,
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(vec![Method::GET], path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(vec![Method::POST], path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(vec![Method::PUT], path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(vec![Method::DELETE], path)
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = Some(cors);
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    #[must_use]
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

/// One row of a controller's handler table.
pub struct HandlerEntry {
    /// Handler name; entries whose name starts with `_` are skipped at
    /// registration time.
    pub name: &'static str,
    pub kind: HandlerKind,
}

pub enum HandlerKind {
    Action {
        annotation: RouteAnnotation,
        action: Action,
    },
    /// The designated fallback error handler; at most one may exist per
    /// controller tree.
    ErrorHandler(ErrorAction),
}

impl HandlerEntry {
    pub fn action<F>(name: &'static str, annotation: RouteAnnotation, action: F) -> Self
    where
        F: Fn(&PathParams, &RequestContext) -> Result<ResponsePayload, Error>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            kind: HandlerKind::Action {
                annotation,
                action: Arc::new(action),
            },
        }
    }

    pub fn error_handler<F>(name: &'static str, handler: F) -> Self
    where
        F: Fn(StatusCode, &str) -> Result<ResponsePayload, Error> + Send + Sync + 'static,
    {
        Self {
            name,
            kind: HandlerKind::ErrorHandler(Arc::new(handler)),
        }
    }
}

/// A registered controller: a path prefix plus an explicit handler table.
pub trait Controller: Send + Sync {
    /// Diagnostic name, used to label metadata subjects.
    fn name(&self) -> &'static str;

    /// Controller-level path prefix. `/` means no prefix.
    fn prefix(&self) -> &str {
        "/"
    }

    /// Controller-level CORS default; method annotations override it.
    fn cors(&self) -> Option<bool> {
        None
    }

    /// Controller-level middleware; method annotations override it.
    fn middleware(&self) -> Option<Vec<Arc<dyn Middleware>>> {
        None
    }

    /// The handler table consumed by `register_controller`.
    fn handlers(&self) -> Vec<HandlerEntry>;
}
