//! HTTP vocabulary types: the per-request context, the immutable response
//! envelope, the tagged union of action return kinds, and the status-carrying
//! error.

mod error;
mod payload;
mod request;
mod response;

pub use error::HttpError;
pub use payload::{
    DownloadResponse, HtmlResponse, JsonResponse, RedirectBackResponse, RedirectResponse,
    ResponsePayload, ViewResponse,
};
pub use request::{RequestContext, RequestFile};
pub use response::{Body, ResponseEnvelope};
