pub mod core;
pub mod http_server;
pub mod module;
pub mod service;

pub use core::{RunningServer, Server, ServerOptions};
pub use http_server::{HttpServer, ServerHandle};
pub use module::{AnonymousRoute, Module, Plugin};
pub use service::AppService;
