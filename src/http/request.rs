//! Per-request context.
//!
//! One [`RequestContext`] is built per inbound connection from the raw parts
//! (method, target, headers, body bytes) and is read-only once the body-load
//! phase completes. It owns the per-request CSP nonce.

use std::collections::HashMap;
use std::path::Path;

use http::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ids::Nonce;

/// An uploaded file surfaced by the multipart collaborator.
///
/// Body parsing for `multipart/form-data` itself lives outside the runtime;
/// whatever parses it hands the resulting files over via
/// [`RequestContext::attach_files`].
#[derive(Debug, Clone)]
pub struct RequestFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RequestFile {
    /// Persist the file under `directory`, keeping the client filename
    /// unless `name` overrides it (the original extension is kept).
    pub fn store(&self, directory: &Path, name: Option<&str>) -> std::io::Result<std::path::PathBuf> {
        std::fs::create_dir_all(directory)?;
        let file_name = match name {
            Some(name) => match self.filename.rsplit_once('.') {
                Some((_, ext)) => format!("{name}.{ext}"),
                None => name.to_string(),
            },
            None => self.filename.clone(),
        };
        let path = directory.join(file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: HashMap<String, Vec<String>>,
    query: HashMap<String, String>,
    cookies: HashMap<String, String>,
    body: Option<Value>,
    files: HashMap<String, Vec<RequestFile>>,
    nonce: Nonce,
}

/// Strip the trailing slash, except for the root path.
fn normalize_path(path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path
    }
}

fn parse_cookies(headers: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .and_then(|values| values.first())
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_query_params(target: &str) -> HashMap<String, String> {
    match target.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        None => HashMap::new(),
    }
}

impl RequestContext {
    /// Build a context from raw request parts. Header keys are expected
    /// lowercase (the HTTP service lowercases them on extraction).
    pub fn new(
        method: Method,
        target: &str,
        headers: HashMap<String, Vec<String>>,
        raw_body: Option<&[u8]>,
    ) -> Self {
        let path = normalize_path(target.split('?').next().unwrap_or("/"));
        let query = parse_query_params(target);
        let cookies = parse_cookies(&headers);

        let mut context = Self {
            method,
            path,
            headers,
            query,
            cookies,
            body: None,
            files: HashMap::new(),
            nonce: Nonce::new(),
        };
        context.body = context.parse_body(raw_body);
        context
    }

    fn parse_body(&self, raw: Option<&[u8]>) -> Option<Value> {
        let raw = raw?;
        if raw.is_empty() || self.method == Method::GET || self.method == Method::HEAD {
            return None;
        }
        let content_type = self.header("content-type").unwrap_or_default().to_string();

        if content_type.contains("json") {
            let parsed = serde_json::from_slice(raw);
            if parsed.is_err() {
                debug!(content_type = %content_type, "request body is not valid JSON");
            }
            return parsed.ok();
        }

        if content_type.contains("application/x-www-form-urlencoded") {
            let fields: Map<String, Value> = url::form_urlencoded::parse(raw)
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            return Some(Value::Object(fields));
        }

        // Multipart parsing is an external collaborator; see `attach_files`.
        None
    }

    /// Hand over parsed multipart fields and files. Only the body-load phase
    /// calls this; the context is read-only afterwards.
    pub fn attach_files(&mut self, fields: Value, files: HashMap<String, Vec<RequestFile>>) {
        self.body = Some(fields);
        self.files = files;
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized path: no query string, trailing slash stripped except root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a header, by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    #[must_use]
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    /// Parsed body, when the content type had a parser (JSON, form).
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// A single body field by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|body| body.get(name))
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&[RequestFile]> {
        self.files.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn files(&self) -> &HashMap<String, Vec<RequestFile>> {
        &self.files
    }

    /// Per-request CSP nonce.
    #[must_use]
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// XHR or JSON-accepting clients get JSON error bodies.
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
            || self
                .header("accept")
                .is_some_and(|v| v.contains("application/json"))
    }

    /// A body-carrying request: has a content type and a method that takes
    /// a body.
    #[must_use]
    pub fn is_form(&self) -> bool {
        self.header("content-type").is_some()
            && !matches!(self.method.as_str(), "GET" | "HEAD" | "PROPFIND" | "SEARCH")
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.is_form()
            && self
                .header("content-type")
                .is_some_and(|v| v.contains("multipart/form-data"))
    }

    /// Whether this request could be served from the static directory:
    /// GET, not the root path, and a file exists at the mapped location.
    #[must_use]
    pub fn is_static_file_request(&self, static_dir: &Path) -> bool {
        if self.method != Method::GET || self.path == "/" {
            return false;
        }
        std::fs::metadata(static_dir.join(self.path.trim_start_matches('/'))).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect()
    }

    #[test]
    fn path_is_normalized() {
        let req = RequestContext::new(Method::GET, "/users/?sort=asc", HashMap::new(), None);
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query_param("sort"), Some("asc"));
    }

    #[test]
    fn root_path_keeps_its_slash() {
        let req = RequestContext::new(Method::GET, "/", HashMap::new(), None);
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn cookies_are_parsed() {
        let req = RequestContext::new(
            Method::GET,
            "/",
            headers(&[("cookie", "a=b; session=xyz")]),
            None,
        );
        assert_eq!(req.cookie("a"), Some("b"));
        assert_eq!(req.cookie("session"), Some("xyz"));
    }

    #[test]
    fn json_body_is_parsed_for_post() {
        let req = RequestContext::new(
            Method::POST,
            "/submit",
            headers(&[("content-type", "application/json")]),
            Some(br#"{"name":"ada"}"#),
        );
        assert_eq!(
            req.input("name").and_then(Value::as_str),
            Some("ada")
        );
    }

    #[test]
    fn form_body_is_parsed() {
        let req = RequestContext::new(
            Method::POST,
            "/submit",
            headers(&[("content-type", "application/x-www-form-urlencoded")]),
            Some(b"name=ada&job=engineer"),
        );
        assert_eq!(req.input("job").and_then(Value::as_str), Some("engineer"));
    }

    #[test]
    fn ajax_detection() {
        let xhr = RequestContext::new(
            Method::GET,
            "/",
            headers(&[("x-requested-with", "XMLHttpRequest")]),
            None,
        );
        assert!(xhr.is_ajax());
        let json = RequestContext::new(
            Method::GET,
            "/",
            headers(&[("accept", "application/json, text/plain")]),
            None,
        );
        assert!(json.is_ajax());
        let plain = RequestContext::new(Method::GET, "/", HashMap::new(), None);
        assert!(!plain.is_ajax());
    }

    #[test]
    fn multipart_detection() {
        let req = RequestContext::new(
            Method::POST,
            "/upload",
            headers(&[("content-type", "multipart/form-data; boundary=x")]),
            None,
        );
        assert!(req.is_form());
        assert!(req.is_multipart());
    }

    #[test]
    fn nonce_differs_between_requests() {
        let a = RequestContext::new(Method::GET, "/", HashMap::new(), None);
        let b = RequestContext::new(Method::GET, "/", HashMap::new(), None);
        assert_ne!(a.nonce().as_str(), b.nonce().as_str());
    }
}
