use crate::error::Error;
use crate::http::RequestContext;
use crate::router::PathParams;

/// A handler invoked before the route action, with the same params and
/// request. Middleware runs in declaration order and short-circuits the
/// dispatch by returning an error, which flows into the standard error
/// policy (an `HttpError` keeps its status, anything else becomes a 500).
pub trait Middleware: Send + Sync {
    fn handle(&self, params: &PathParams, request: &RequestContext) -> Result<(), Error>;
}
