use http::StatusCode;

/// An error carrying an explicit HTTP status code.
///
/// This is the only error kind whose message is allowed to reach the client;
/// everything else collapses to a terse status in production.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    /// Build an error whose message is the status' canonical reason phrase
    /// (`404` → `"Not Found"`).
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            message: status.canonical_reason().unwrap_or("HTTP Error").to_string(),
            status,
        }
    }

    #[must_use]
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }
}
