//! # wharf
//!
//! **wharf** is a small, coroutine-powered web-application runtime for Rust:
//! a dependency-injected controller/router that turns declared routes into an
//! HTTP/WebSocket dispatch pipeline, synthesizing security headers,
//! negotiating response body types, and producing a uniform error surface.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`router`]** - Path-pattern matching and the ordered route registry;
//!   controllers register explicit handler tables through the metadata store
//! - **[`dispatcher`]** - The request state machine: match → middleware →
//!   action → negotiation → security headers → error mapping
//! - **[`http`]** - Request context, response envelope, response-kind union
//!   and the status-carrying error type
//! - **[`websocket`]** - Channel broadcaster with authorize-then-deliver
//!   semantics, addressed by the same path patterns as HTTP routes
//! - **[`injector`]** - Singleton dependency container with cycle detection
//! - **[`metadata`]** - Arena-indexed annotation store decoupling "declare"
//!   from "register"
//! - **[`server`]** - `may_minihttp` service, module/plugin resolution and
//!   the orchestrating [`Server`](server::Server)
//! - **[`config`]** - The `AppConfig` tree (CSP, CORS, cookies, cache, TLS,
//!   WebSocket, static/views directories)
//! - **[`view`]** - Strict template rendering (the view collaborator)
//! - **[`static_files`]** - Traversal-safe static file serving
//! - **[`hot_reload`]** - Dev-mode reload channel and filesystem watcher
//!
//! ## Request Handling Flow
//!
//! ```text
//! Client ──▶ AppService (may_minihttp)
//!             │  parse parts, build RequestContext (+ CSP nonce)
//!             ▼
//!            Dispatcher::respond
//!             │  match route (registration order)
//!             │  render declared view, or run middleware then the action
//!             │  negotiate payload → body + content-type (+ status)
//!             │  compute CSP/CORS/fixed security headers, merge tiers
//!             │  append cookies, apply no-content downgrade
//!             ▼
//!            ResponseEnvelope ──▶ bytes on the wire
//! ```
//!
//! Errors anywhere in that pipeline map into the two-tier policy: HTTP
//! errors (and everything, in production) yield their status with a terse
//! body; in development a diagnostic page carries the error's origin and a
//! source snippet.
//!
//! ## Runtime Considerations
//!
//! wharf runs on the `may` coroutine runtime, not tokio. Handlers are plain
//! functions executing inside coroutines; blocking I/O through `may`'s types
//! suspends the coroutine instead of the thread. Requests on one connection
//! are handled strictly sequentially; nothing in the runtime takes a lock on
//! the hot path. Stack size is configurable via `WHARF_STACK_SIZE`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wharf::config::AppConfig;
//! use wharf::http::ResponsePayload;
//! use wharf::router::{Controller, HandlerEntry, RouteAnnotation};
//! use wharf::server::{Server, ServerOptions};
//! use std::sync::Arc;
//!
//! struct RootController;
//!
//! impl Controller for RootController {
//!     fn name(&self) -> &'static str {
//!         "RootController"
//!     }
//!
//!     fn handlers(&self) -> Vec<HandlerEntry> {
//!         vec![HandlerEntry::action("index", RouteAnnotation::get("/"), |_, _| {
//!             Ok(ResponsePayload::from("Hello from wharf!"))
//!         })]
//!     }
//! }
//!
//! fn main() -> Result<(), wharf::Error> {
//!     wharf::logging::init();
//!     let server = Server::new(ServerOptions {
//!         config: AppConfig::default(),
//!         controllers: vec![Arc::new(RootController)],
//!         ..ServerOptions::default()
//!     })?;
//!     let running = server.start()?;
//!     running.wait_ready().ok();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
mod error;
pub mod hot_reload;
pub mod http;
pub mod ids;
pub mod injector;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod router;
pub mod server;
pub mod static_files;
pub mod view;
pub mod websocket;

pub use crate::error::Error;
pub use crate::http::{HttpError, RequestContext, ResponseEnvelope, ResponsePayload};
pub use crate::router::{Controller, HandlerEntry, RouteAnnotation, RouteRegistry};
pub use crate::server::{Server, ServerOptions};
pub use crate::websocket::{Channel, ChannelBroadcaster};
