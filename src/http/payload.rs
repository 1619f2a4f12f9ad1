//! Action return kinds.
//!
//! Everything an action may return is a variant of [`ResponsePayload`]; the
//! dispatcher negotiates the union into a concrete body, content type and
//! status with an exhaustive match, so "invalid response type" is
//! unrepresentable by construction.

use std::collections::HashMap;

use http::StatusCode;
use serde_json::Value;

/// The tagged union the negotiation table (dispatcher) consumes.
#[derive(Debug, Clone)]
pub enum ResponsePayload {
    /// A primitive rendered with `to_string`; negotiates to `text/html`.
    Text(String),
    /// No content.
    None,
    /// A plain object or array; negotiates to `application/json`.
    Json(Value),
    Download(DownloadResponse),
    Html(HtmlResponse),
    JsonDocument(JsonResponse),
    Redirect(RedirectResponse),
    RedirectBack(RedirectBackResponse),
    View(ViewResponse),
    /// Raw bytes; negotiates to `application/octet-stream`.
    Binary(Vec<u8>),
}

impl From<String> for ResponsePayload {
    fn from(value: String) -> Self {
        ResponsePayload::Text(value)
    }
}

impl From<&str> for ResponsePayload {
    fn from(value: &str) -> Self {
        ResponsePayload::Text(value.to_string())
    }
}

impl From<bool> for ResponsePayload {
    fn from(value: bool) -> Self {
        ResponsePayload::Text(value.to_string())
    }
}

impl From<i64> for ResponsePayload {
    fn from(value: i64) -> Self {
        ResponsePayload::Text(value.to_string())
    }
}

impl From<u64> for ResponsePayload {
    fn from(value: u64) -> Self {
        ResponsePayload::Text(value.to_string())
    }
}

impl From<f64> for ResponsePayload {
    fn from(value: f64) -> Self {
        ResponsePayload::Text(value.to_string())
    }
}

impl From<Value> for ResponsePayload {
    fn from(value: Value) -> Self {
        ResponsePayload::Json(value)
    }
}

impl From<Vec<u8>> for ResponsePayload {
    fn from(value: Vec<u8>) -> Self {
        ResponsePayload::Binary(value)
    }
}

impl From<()> for ResponsePayload {
    fn from((): ()) -> Self {
        ResponsePayload::None
    }
}

/// A JSON-serialized payload delivered as an attachment.
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub content: Value,
    pub filename: String,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl DownloadResponse {
    #[must_use]
    pub fn new(content: Value, filename: impl Into<String>) -> Self {
        Self {
            content,
            filename: filename.into(),
            status: None,
            cookies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<DownloadResponse> for ResponsePayload {
    fn from(value: DownloadResponse) -> Self {
        ResponsePayload::Download(value)
    }
}

/// A raw HTML string with an optional status override.
#[derive(Debug, Clone)]
pub struct HtmlResponse {
    pub content: String,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl HtmlResponse {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: None,
            cookies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl From<HtmlResponse> for ResponsePayload {
    fn from(value: HtmlResponse) -> Self {
        ResponsePayload::Html(value)
    }
}

/// A JSON document with an optional status override.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub content: Value,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl JsonResponse {
    #[must_use]
    pub fn new(content: Value) -> Self {
        Self {
            content,
            status: None,
            cookies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl From<JsonResponse> for ResponsePayload {
    fn from(value: JsonResponse) -> Self {
        ResponsePayload::JsonDocument(value)
    }
}

/// Redirect to a destination; relative destinations are made absolute
/// against the server's base URL during negotiation.
#[derive(Debug, Clone)]
pub struct RedirectResponse {
    pub destination: String,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl RedirectResponse {
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            status: None,
            cookies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<RedirectResponse> for ResponsePayload {
    fn from(value: RedirectResponse) -> Self {
        ResponsePayload::Redirect(value)
    }
}

/// Redirect back to the referring page, with a fallback destination when
/// the client sent no `referer`.
#[derive(Debug, Clone, Default)]
pub struct RedirectBackResponse {
    pub fallback: Option<String>,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl RedirectBackResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<RedirectBackResponse> for ResponsePayload {
    fn from(value: RedirectBackResponse) -> Self {
        ResponsePayload::RedirectBack(value)
    }
}

/// A named template rendered by the view collaborator.
#[derive(Debug, Clone)]
pub struct ViewResponse {
    pub view: String,
    pub data: Value,
    pub status: Option<StatusCode>,
    pub cookies: HashMap<String, String>,
}

impl ViewResponse {
    #[must_use]
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            data: Value::Object(serde_json::Map::new()),
            status: None,
            cookies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<ViewResponse> for ResponsePayload {
    fn from(value: ViewResponse) -> Self {
        ResponsePayload::View(value)
    }
}
