//! Error taxonomy for the runtime.
//!
//! Three kinds of failure exist, with very different policies:
//!
//! - [`HttpError`] carries an explicit status code and is the only error whose
//!   message may leak to the client.
//! - Configuration errors (duplicate error handler, cyclic dependency graph,
//!   malformed TLS config) are fatal at startup and never recovered.
//! - Runtime errors cover everything thrown inside middleware, actions and
//!   view rendering. They record their origin (`file:line` via
//!   `#[track_caller]`) so the development error page can show a source
//!   snippet.

use std::panic::Location;

use crate::http::HttpError;

/// Unified error type flowing through registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error with an explicit HTTP status; surfaces to the client.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Invalid setup detected at startup or registration time. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything thrown inside middleware, an action or view rendering.
    #[error("{message}")]
    Runtime {
        message: String,
        /// Source file of the construction site.
        file: &'static str,
        /// Line of the construction site.
        line: u32,
        /// Best-effort name of the failing operation, when the caller set one.
        symbol: Option<String>,
    },
}

impl Error {
    /// Build a runtime error, capturing the caller's source location.
    #[track_caller]
    pub fn runtime(message: impl Into<String>) -> Self {
        let location = Location::caller();
        Error::Runtime {
            message: message.into(),
            file: location.file(),
            line: location.line(),
            symbol: None,
        }
    }

    /// Like [`Error::runtime`], tagged with the name of the failing operation.
    #[track_caller]
    pub fn runtime_in(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Error::Runtime {
            message: message.into(),
            file: location.file(),
            line: location.line(),
            symbol: Some(symbol.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// The origin recorded at construction, if this error has one.
    #[must_use]
    pub fn origin(&self) -> Option<(&'static str, u32, Option<&str>)> {
        match self {
            Error::Runtime {
                file, line, symbol, ..
            } => Some((file, *line, symbol.as_deref())),
            _ => None,
        }
    }

    /// Message as shown to clients (HTTP errors) or logs (everything else).
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Error::Http(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}
