//! Server orchestrator.
//!
//! The composition root: validates configuration, wires the framework
//! services through the dependency container, flattens the module/plugin
//! tree into the route registry and the channel broadcaster, and binds the
//! HTTP and WebSocket listeners.

use std::sync::{Arc, PoisonError, RwLock};

use may::coroutine::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::hot_reload::{self, HotReloadChannel};
use crate::injector::Container;
use crate::router::{Controller, RouteRegistry};
use crate::server::http_server::{HttpServer, ServerHandle};
use crate::server::module::{AnonymousRoute, Module, Plugin};
use crate::server::service::AppService;
use crate::view::ViewRenderer;
use crate::websocket::{listener, Channel, ChannelBroadcaster};

/// Everything a service hands to [`Server::new`].
#[derive(Default)]
pub struct ServerOptions {
    pub config: AppConfig,
    pub modules: Vec<Module>,
    pub controllers: Vec<Arc<dyn Controller>>,
    pub routes: Vec<AnonymousRoute>,
    pub channels: Vec<Arc<dyn Channel>>,
    pub plugins: Vec<Plugin>,
}

pub struct Server {
    container: Container,
    config: Arc<AppConfig>,
    registry: Arc<RwLock<RouteRegistry>>,
    broadcaster: ChannelBroadcaster,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// Build the dependency graph and resolve the declared module/plugin
    /// tree. Configuration violations and duplicate registrations fail
    /// here, before anything listens.
    pub fn new(options: ServerOptions) -> Result<Self, Error> {
        let ServerOptions {
            mut config,
            modules,
            controllers,
            routes,
            channels,
            plugins,
        } = options;

        config.apply_env();
        config.validate()?;

        let mut container = Container::new();
        container.provide_value(config);
        container.provide(|c| Ok(ViewRenderer::new(c.resolve::<AppConfig>()?)));
        container.provide(|_| Ok(RwLock::new(RouteRegistry::new())));
        container.provide_value(ChannelBroadcaster::new());
        container.provide(|c| {
            Ok(Dispatcher::new(
                c.resolve::<RwLock<RouteRegistry>>()?,
                c.resolve::<AppConfig>()?,
                c.resolve::<ViewRenderer>()?,
            ))
        });

        let config = container.resolve::<AppConfig>()?;
        let registry = container.resolve::<RwLock<RouteRegistry>>()?;
        let broadcaster = (*container.resolve::<ChannelBroadcaster>()?).clone();

        let mut server = Self {
            container,
            config,
            registry,
            broadcaster,
        };

        if !server.config.is_production && server.config.hot_reload.enabled {
            server.broadcaster.register(Arc::new(HotReloadChannel))?;
        }

        for module in modules {
            server.register_module(module)?;
        }
        for controller in controllers {
            server.register_controller(controller.as_ref())?;
        }
        for route in routes {
            server.register_route(route)?;
        }
        for channel in channels {
            server.broadcaster.register(channel)?;
        }
        for plugin in plugins {
            server.register_plugin(plugin)?;
        }

        Ok(server)
    }

    /// The container, for wiring application services before start.
    pub fn container(&mut self) -> &mut Container {
        &mut self.container
    }

    #[must_use]
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> Arc<RwLock<RouteRegistry>> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn broadcaster(&self) -> ChannelBroadcaster {
        self.broadcaster.clone()
    }

    pub fn register_controller(&mut self, controller: &dyn Controller) -> Result<(), Error> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_controller(controller)
    }

    pub fn register_route(&mut self, route: AnonymousRoute) -> Result<(), Error> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(&route.path, route.methods, route.action, route.options)
    }

    /// Depth-first flattening of a module tree.
    fn register_module(&mut self, module: Module) -> Result<(), Error> {
        for controller in module.controllers {
            self.register_controller(controller.as_ref())?;
        }
        for channel in module.channels {
            self.broadcaster.register(channel)?;
        }
        for route in module.routes {
            self.register_route(route)?;
        }
        for import in module.imports {
            self.register_module(import)?;
        }
        Ok(())
    }

    fn register_plugin(&mut self, plugin: Plugin) -> Result<(), Error> {
        info!(plugin = %plugin.name, "Registering plugin");
        if let Some(hook) = plugin.on_load {
            hook()?;
        }
        for module in plugin.modules {
            self.register_module(module)?;
        }
        for controller in plugin.controllers {
            self.register_controller(controller.as_ref())?;
        }
        for route in plugin.routes {
            self.register_route(route)?;
        }
        for channel in plugin.channels {
            self.broadcaster.register(channel)?;
        }
        Ok(())
    }

    /// Bind and serve. Consumes the server; the returned handle owns the
    /// listeners and the dev-mode filesystem watcher.
    pub fn start(mut self) -> Result<RunningServer, Error> {
        // One logical worker: requests interleave at suspension points,
        // never in parallel over shared state.
        may::config()
            .set_workers(1)
            .set_stack_size(AppConfig::stack_size());

        let dispatcher = self.container.resolve::<Dispatcher>()?;
        let service = AppService {
            dispatcher,
            config: Arc::clone(&self.config),
        };

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let http = HttpServer(service)
            .start(&addr)
            .map_err(|e| Error::configuration(format!("cannot bind {addr}: {e}")))?;
        info!("HTTP server is running on {}", self.config.base_url());

        let web_socket = if self.config.web_socket.enabled {
            let handle = listener::start(Arc::clone(&self.config), self.broadcaster.clone())
                .map_err(|e| {
                    Error::configuration(format!(
                        "cannot bind web socket port {}: {e}",
                        self.config.web_socket.port
                    ))
                })?;
            Some(handle)
        } else {
            None
        };

        let watcher = if !self.config.is_production && self.config.hot_reload.enabled {
            hot_reload::watch(
                &[
                    self.config.views_directory.clone(),
                    self.config.static_files_directory.clone(),
                ],
                self.broadcaster.clone(),
            )
            .ok()
        } else {
            None
        };

        Ok(RunningServer {
            http,
            web_socket,
            broadcaster: self.broadcaster,
            _watcher: watcher,
        })
    }
}

/// A started server: HTTP handle, optional WebSocket listener, and the
/// broadcaster for pushing server-initiated messages.
pub struct RunningServer {
    http: ServerHandle,
    web_socket: Option<JoinHandle<()>>,
    broadcaster: ChannelBroadcaster,
    _watcher: Option<notify::RecommendedWatcher>,
}

impl RunningServer {
    pub fn wait_ready(&self) -> std::io::Result<()> {
        self.http.wait_ready()
    }

    #[must_use]
    pub fn broadcaster(&self) -> ChannelBroadcaster {
        self.broadcaster.clone()
    }

    /// Stop the HTTP listener and cancel the WebSocket accept loop.
    pub fn stop(self) {
        self.http.stop();
        if let Some(handle) = self.web_socket {
            // SAFETY: cancelling the accept-loop coroutine at shutdown; the
            // handle is owned and valid here.
            unsafe {
                handle.coroutine().cancel();
            }
            let _ = handle.join();
        }
    }
}
