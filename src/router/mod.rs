//! # Router Module
//!
//! Path-pattern matching and the ordered route registry.
//!
//! Route paths are templates with named segments (`/users/:id`). At
//! registration time each template is compiled into a regex; at dispatch
//! time the registry walks its routes **in registration order** and the
//! first route whose method set contains the request method and whose
//! pattern matches the path wins; no ranking by specificity is performed.
//!
//! The same pattern primitive addresses WebSocket channels, so channel
//! names like `rooms/:id` match exactly the way HTTP routes do.

mod controller;
mod core;
mod pattern;

pub use controller::{Action, Controller, ErrorAction, HandlerEntry, HandlerKind, RouteAnnotation};
pub use core::{resolve_route_path, Route, RouteMatch, RouteOptions, RouteRegistry};
pub use pattern::{param, PathParams, PathPattern, MAX_INLINE_PARAMS};
