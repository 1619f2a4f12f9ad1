use http::StatusCode;

/// Response body, after negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(s) => s.is_empty(),
            Body::Binary(b) => b.is_empty(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Text(s) => s.len(),
            Body::Binary(b) => b.len(),
        }
    }

    /// Consume into the raw bytes written to the wire.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Text(s) => s.into_bytes(),
            Body::Binary(b) => b,
        }
    }
}

/// Immutable `{content, headers, status}` bag handed back by the dispatcher.
///
/// Headers are an ordered multi-map: `set-cookie` may repeat, and insertion
/// order is preserved on the wire. Augmentation happens by constructing a new
/// envelope, never by mutating one the dispatcher already produced;
/// [`ResponseEnvelope::with_header`] returns a copy with the entry appended.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    body: Body,
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn new(body: Body, headers: Vec<(String, String)>, status: StatusCode) -> Self {
        Self {
            body,
            headers,
            status,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value for a header name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a header name, in insertion order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// A new envelope with the header appended (repeats allowed).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_header_appends_without_replacing() {
        let envelope = ResponseEnvelope::new(Body::Empty, Vec::new(), StatusCode::OK)
            .with_header("set-cookie", "a=1")
            .with_header("set-cookie", "b=2");
        assert_eq!(envelope.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(envelope.header("set-cookie"), Some("a=1"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let envelope = ResponseEnvelope::new(Body::Empty, Vec::new(), StatusCode::OK)
            .with_header("Content-Type", "text/html");
        assert_eq!(envelope.header("content-type"), Some("text/html"));
    }

    #[test]
    fn body_emptiness() {
        assert!(Body::Empty.is_empty());
        assert!(Body::Text(String::new()).is_empty());
        assert!(!Body::Text("x".into()).is_empty());
        assert_eq!(Body::Binary(vec![1, 2, 3]).len(), 3);
    }
}
