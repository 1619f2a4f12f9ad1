//! Response negotiation: turn an action's return value into a concrete
//! body, content type and status.
//!
//! The dispatch over [`ResponsePayload`] is an exhaustive match: every
//! representable payload negotiates to something, so there is no
//! "invalid response type" at runtime.

use std::collections::HashMap;

use http::StatusCode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Error;
use crate::http::{Body, RequestContext, ResponsePayload};
use crate::ids::Nonce;
use crate::view::ViewRenderer;

/// The outcome of negotiation, merged into the envelope by the dispatcher.
pub struct Negotiated {
    pub body: Body,
    pub content_type: &'static str,
    /// Status the payload itself requested (redirects, wrapper overrides).
    pub status: Option<StatusCode>,
    /// Extra headers the payload produced (`location`,
    /// `content-disposition`).
    pub headers: Vec<(String, String)>,
    /// Cookies carried by wrapper payloads.
    pub cookies: HashMap<String, String>,
}

impl Negotiated {
    fn text(body: String, content_type: &'static str) -> Self {
        Self {
            body: Body::Text(body),
            content_type,
            status: None,
            headers: Vec::new(),
            cookies: HashMap::new(),
        }
    }

    fn empty() -> Self {
        Self {
            body: Body::Empty,
            content_type: "text/html",
            status: None,
            headers: Vec::new(),
            cookies: HashMap::new(),
        }
    }
}

fn to_json_text(value: &Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::runtime(format!("cannot serialize body: {e}")))
}

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s]+$").expect("valid url regex"));

/// Absolute destinations pass through; anything else is resolved against
/// the server's base URL.
fn absolute_url(destination: &str, base_url: &str) -> String {
    if URL_RE.is_match(destination) {
        destination.to_string()
    } else {
        format!("{base_url}{destination}")
    }
}

/// First matching case wins, in the order of the negotiation table.
pub fn negotiate(
    payload: ResponsePayload,
    request: &RequestContext,
    views: &ViewRenderer,
    base_url: &str,
) -> Result<Negotiated, Error> {
    match payload {
        ResponsePayload::Text(text) => Ok(Negotiated::text(text, "text/html")),

        ResponsePayload::None => Ok(Negotiated::empty()),

        ResponsePayload::Json(value) => {
            Ok(Negotiated::text(to_json_text(&value)?, "application/json"))
        }

        ResponsePayload::Download(download) => {
            let mut negotiated = Negotiated::text(
                to_json_text(&download.content)?,
                "application/octet-stream",
            );
            negotiated.headers.push((
                "content-disposition".to_string(),
                format!("attachment; filename=\"{}\"", download.filename),
            ));
            negotiated.status = download.status;
            negotiated.cookies = download.cookies;
            Ok(negotiated)
        }

        ResponsePayload::Html(html) => {
            let mut negotiated = Negotiated::text(html.content, "text/html");
            negotiated.status = html.status;
            negotiated.cookies = html.cookies;
            Ok(negotiated)
        }

        ResponsePayload::JsonDocument(json) => {
            let mut negotiated =
                Negotiated::text(to_json_text(&json.content)?, "application/json");
            negotiated.status = json.status;
            negotiated.cookies = json.cookies;
            Ok(negotiated)
        }

        ResponsePayload::Redirect(redirect) => {
            let mut negotiated = Negotiated::empty();
            negotiated.status = Some(redirect.status.unwrap_or(StatusCode::FOUND));
            negotiated.headers.push((
                "location".to_string(),
                absolute_url(&redirect.destination, base_url),
            ));
            negotiated.cookies = redirect.cookies;
            Ok(negotiated)
        }

        ResponsePayload::RedirectBack(back) => {
            let mut negotiated = Negotiated::empty();
            negotiated.status = Some(back.status.unwrap_or(StatusCode::FOUND));
            let location = match request.header("referer") {
                Some(referrer) => referrer.to_string(),
                None => absolute_url(back.fallback.as_deref().unwrap_or("/"), base_url),
            };
            negotiated.headers.push(("location".to_string(), location));
            negotiated.cookies = back.cookies;
            Ok(negotiated)
        }

        ResponsePayload::View(view) => {
            let rendered = views.render(&view.view, &view.data, request.nonce())?;
            let mut negotiated = Negotiated::text(rendered, "text/html");
            negotiated.status = view.status;
            negotiated.cookies = view.cookies;
            Ok(negotiated)
        }

        ResponsePayload::Binary(bytes) => Ok(Negotiated {
            body: Body::Binary(bytes),
            content_type: "application/octet-stream",
            status: None,
            headers: Vec::new(),
            cookies: HashMap::new(),
        }),
    }
}

/// Re-exported for the dispatcher's diagnostic page, which renders with the
/// request nonce but no registered view file.
pub(crate) fn render_inline(
    views: &ViewRenderer,
    name: &str,
    source: &str,
    data: &Value,
    nonce: &Nonce,
) -> Result<String, Error> {
    views.render_source(name, source, data, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            absolute_url("https://example.com/x", "http://localhost:5050"),
            "https://example.com/x"
        );
    }

    #[test]
    fn relative_paths_gain_the_base_url() {
        assert_eq!(
            absolute_url("/login", "http://localhost:5050"),
            "http://localhost:5050/login"
        );
    }
}
