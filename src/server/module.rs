//! Module and plugin composites.
//!
//! A module is a declarative tree of controllers, anonymous routes, channels
//! and nested modules. The server flattens the tree depth-first into the
//! route registry and the channel broadcaster at startup; nothing else is
//! read from it afterwards.

use std::sync::Arc;

use http::Method;

use crate::error::Error;
use crate::router::{Action, Controller, RouteOptions};
use crate::websocket::Channel;

/// A route declared outside any controller.
pub struct AnonymousRoute {
    pub path: String,
    pub methods: Vec<Method>,
    pub action: Option<Action>,
    pub options: RouteOptions,
}

impl AnonymousRoute {
    pub fn new<F>(methods: Vec<Method>, path: impl Into<String>, action: F) -> Self
    where
        F: Fn(
                &crate::router::PathParams,
                &crate::http::RequestContext,
            ) -> Result<crate::http::ResponsePayload, Error>
            + Send
            + Sync
            + 'static,
    {
        Self {
            path: path.into(),
            methods,
            action: Some(Arc::new(action)),
            options: RouteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Default)]
pub struct Module {
    pub controllers: Vec<Arc<dyn Controller>>,
    pub routes: Vec<AnonymousRoute>,
    pub channels: Vec<Arc<dyn Channel>>,
    pub imports: Vec<Module>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    #[must_use]
    pub fn route(mut self, route: AnonymousRoute) -> Self {
        self.routes.push(route);
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.push(channel);
        self
    }

    #[must_use]
    pub fn import(mut self, module: Module) -> Self {
        self.imports.push(module);
        self
    }
}

/// A named module bundle with an optional load hook, resolved after the
/// application's own modules at startup.
pub struct Plugin {
    pub name: String,
    pub on_load: Option<Box<dyn FnOnce() -> Result<(), Error> + Send>>,
    pub modules: Vec<Module>,
    pub controllers: Vec<Arc<dyn Controller>>,
    pub routes: Vec<AnonymousRoute>,
    pub channels: Vec<Arc<dyn Channel>>,
}

impl Plugin {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_load: None,
            modules: Vec::new(),
            controllers: Vec::new(),
            routes: Vec::new(),
            channels: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        self.on_load = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }
}
