//! # Dispatcher Module
//!
//! The dispatcher turns a matched request into a concrete
//! [`ResponseEnvelope`](crate::http::ResponseEnvelope). One `respond` call
//! drives the whole state machine:
//!
//! 1. match the request against the route registry (registration order)
//! 2. short-circuit to view rendering when the route declares one
//! 3. run the route's middleware in order
//! 4. invoke the bound action
//! 5. negotiate the returned payload into a body + content type
//! 6. compute CSP/CORS/fixed security headers and merge the header tiers
//! 7. append cookies, apply the no-content downgrade
//!
//! Failures anywhere in the pipeline flow into the two-tier error policy:
//! production (or any `HttpError`) yields a terse status (JSON for AJAX
//! clients, the registered error handler otherwise), while development
//! renders a diagnostic page with the error's origin and a source snippet.

mod core;
mod headers;
mod negotiate;

pub use core::{Dispatcher, ResponseOptions};
pub use headers::{cors_headers, security_headers};
pub use negotiate::{negotiate, Negotiated};
