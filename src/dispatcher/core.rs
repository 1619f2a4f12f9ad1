//! Dispatcher core - hot path for request dispatch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use http::{Method, StatusCode};
use serde_json::json;
use tracing::{error, warn};

use crate::config::{AppConfig, SECONDS_PER_DAY};
use crate::dispatcher::headers::security_headers;
use crate::dispatcher::negotiate::{negotiate, render_inline};
use crate::error::Error;
use crate::http::{
    Body, HttpError, RequestContext, ResponseEnvelope, ResponsePayload, ViewResponse,
};
use crate::router::{Action, PathParams, RouteRegistry};
use crate::static_files::StaticFiles;
use crate::view::ViewRenderer;

/// Options accompanying a payload into response synthesis: the matched
/// route's cookies/headers and its declared default status.
#[derive(Clone, Default)]
pub struct ResponseOptions {
    pub cookies: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub status: Option<StatusCode>,
}

/// Embedded template for the development error page.
const DIAGNOSTIC_TEMPLATE: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Unhandled error</title>
  </head>
  <body>
    <h1>{{ message }}</h1>
    <p><code>{{ file }}{% if line %}:{{ line }}{% endif %}</code>{% if symbol %} in <code>{{ symbol }}</code>{% endif %}</p>
    {% if snippet %}<pre>{{ snippet }}</pre>{% endif %}
  </body>
</html>
"#;

/// Drives a request through match → middleware → action → negotiation →
/// header synthesis, mapping every failure into the two-tier error policy.
pub struct Dispatcher {
    registry: Arc<RwLock<RouteRegistry>>,
    config: Arc<AppConfig>,
    views: Arc<ViewRenderer>,
    static_files: StaticFiles,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<RwLock<RouteRegistry>>,
        config: Arc<AppConfig>,
        views: Arc<ViewRenderer>,
    ) -> Self {
        let static_files = StaticFiles::new(config.static_files_directory.clone());
        Self {
            registry,
            config,
            views,
            static_files,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RwLock<RouteRegistry>> {
        &self.registry
    }

    /// Produce the response for one request. Never fails: dispatch errors
    /// are mapped into error responses here.
    pub fn respond(&self, request: &RequestContext) -> ResponseEnvelope {
        match self.try_respond(request) {
            Ok(envelope) => envelope,
            Err(err) => self.error_response(request, &err),
        }
    }

    fn try_respond(&self, request: &RequestContext) -> Result<ResponseEnvelope, Error> {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(matched) = registry.match_route(request.method(), request.path()) {
            let route = matched.route;
            let options = ResponseOptions {
                cookies: route.options.cookies.clone(),
                headers: route.options.headers.clone(),
                status: route.options.status,
            };

            // A declared view short-circuits dispatch; the action is not run.
            if let Some(view) = &route.options.view {
                let payload = ViewResponse::new(view.clone()).into();
                return self.create_response(request, payload, options);
            }

            for middleware in &route.options.middleware {
                middleware.handle(&matched.params, request)?;
            }

            let payload = match &route.action {
                Some(action) => invoke_action(action, &matched.params, request)?,
                None => ResponsePayload::None,
            };
            return self.create_response(request, payload, options);
        }
        drop(registry);

        if request.is_static_file_request(&self.config.static_files_directory) {
            return self.static_file_response(request);
        }

        Err(HttpError::not_found().into())
    }

    /// Negotiate the payload and synthesize the envelope: header tiers are
    /// security < base < caller, an explicit `content-type` beats the
    /// negotiated one, and cookies append as repeated `set-cookie` entries.
    pub fn create_response(
        &self,
        request: &RequestContext,
        payload: ResponsePayload,
        options: ResponseOptions,
    ) -> Result<ResponseEnvelope, Error> {
        let negotiated = negotiate(payload, request, &self.views, &self.config.base_url())?;
        let requested_status = options.status.unwrap_or(StatusCode::OK);

        let mut headers = security_headers(&self.config, request);

        // Base tier.
        upsert(
            &mut headers,
            "content-type",
            format!("{}; charset=utf-8", negotiated.content_type),
        );
        upsert(&mut headers, "cache-control", self.cache_control(request));
        for (name, value) in &self.config.global_headers {
            upsert(&mut headers, name, value.clone());
        }

        // Caller tier: payload-produced headers, then the route's own.
        for (name, value) in &negotiated.headers {
            upsert(&mut headers, name, value.clone());
        }
        for (name, value) in &options.headers {
            upsert(&mut headers, name, value.clone());
        }

        // Empty content at the declared default status downgrades to 204,
        // unless this is an OPTIONS (preflight) response.
        let status = if negotiated.body == Body::Empty
            && negotiated.status == Some(requested_status)
            && *request.method() != Method::OPTIONS
        {
            StatusCode::NO_CONTENT
        } else {
            negotiated.status.unwrap_or(requested_status)
        };

        let max_age = self.config.cookies.max_age * SECONDS_PER_DAY;
        let mut cookies = options.cookies;
        cookies.extend(negotiated.cookies);
        for (name, value) in &cookies {
            headers.push((
                "set-cookie".to_string(),
                format!("{name}={value}; SameSite=Lax; Max-Age={max_age}"),
            ));
        }

        Ok(ResponseEnvelope::new(negotiated.body, headers, status))
    }

    fn cache_control(&self, request: &RequestContext) -> String {
        if self.config.cache.enabled
            && request.is_static_file_request(&self.config.static_files_directory)
        {
            format!("max-age={}", self.config.cache.max_age * SECONDS_PER_DAY)
        } else {
            "no-cache".to_string()
        }
    }

    fn static_file_response(&self, request: &RequestContext) -> Result<ResponseEnvelope, Error> {
        let (bytes, content_type) = self
            .static_files
            .load(request.path())
            .map_err(|_| Error::from(HttpError::not_found()))?;

        let mut options = ResponseOptions::default();
        options
            .headers
            .insert("content-length".to_string(), bytes.len().to_string());
        options
            .headers
            .insert("content-type".to_string(), content_type.to_string());
        self.create_response(request, ResponsePayload::Binary(bytes), options)
    }

    /// Map a dispatch error into a client response.
    ///
    /// HTTP errors (and, in production, every error) yield their status
    /// with a terse body: JSON for AJAX clients, the registered error
    /// handler's payload otherwise, an empty body as the last resort.
    /// In development, everything else renders the diagnostic page.
    fn error_response(&self, request: &RequestContext, err: &Error) -> ResponseEnvelope {
        let is_http = matches!(err, Error::Http(_));
        if is_http || self.config.is_production {
            let status = match err {
                Error::Http(http_err) => http_err.status,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let message = err.message();
            warn!(status = status.as_u16(), message = %message, "request failed");

            let options = ResponseOptions {
                status: Some(status),
                ..ResponseOptions::default()
            };

            if request.is_ajax() {
                let payload = ResponsePayload::Json(json!({
                    "error": message,
                    "statusCode": status.as_u16(),
                }));
                return self
                    .create_response(request, payload, options)
                    .unwrap_or_else(|_| fallback(status));
            }

            let handler = {
                let registry = self
                    .registry
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                registry.error_handler().cloned()
            };
            if let Some(handler) = handler {
                let handled = handler(status, &message)
                    .and_then(|payload| self.create_response(request, payload, options.clone()));
                return match handled {
                    Ok(envelope) => envelope,
                    Err(handler_err) => {
                        error!(error = %handler_err, "error handler failed");
                        fallback(status)
                    }
                };
            }

            return self
                .create_response(request, ResponsePayload::None, options)
                .unwrap_or_else(|_| fallback(status));
        }

        // Development: never hide the error.
        error!(error = %err, "unhandled error");
        self.diagnostic_response(request, err)
            .unwrap_or_else(|_| fallback(StatusCode::INTERNAL_SERVER_ERROR))
    }

    fn diagnostic_response(
        &self,
        request: &RequestContext,
        err: &Error,
    ) -> Result<ResponseEnvelope, Error> {
        let (file, line, symbol) = match err.origin() {
            Some((file, line, symbol)) => (file, Some(line), symbol),
            None => ("unknown", None, None),
        };
        let snippet = line.and_then(|line| source_snippet(file, line as usize));

        let data = json!({
            "message": err.message(),
            "file": file,
            "line": line,
            "symbol": symbol,
            "snippet": snippet,
        });
        let html = render_inline(
            &self.views,
            "diagnostic",
            DIAGNOSTIC_TEMPLATE,
            &data,
            request.nonce(),
        )?;

        let payload = ResponsePayload::Html(crate::http::HtmlResponse::new(html));
        self.create_response(
            request,
            payload,
            ResponseOptions {
                status: Some(StatusCode::INTERNAL_SERVER_ERROR),
                ..ResponseOptions::default()
            },
        )
    }
}

/// Run the bound action, converting a panic into a runtime error so one
/// failing handler cannot take the worker down.
fn invoke_action(
    action: &Action,
    params: &PathParams,
    request: &RequestContext,
) -> Result<ResponsePayload, Error> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        action(params, request)
    }));
    match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %message, "handler panicked");
            Err(Error::runtime(format!("handler panicked: {message}")))
        }
    }
}

/// Last-resort envelope when even error synthesis fails.
fn fallback(status: StatusCode) -> ResponseEnvelope {
    ResponseEnvelope::new(
        Body::Empty,
        vec![(
            "content-type".to_string(),
            "text/html; charset=utf-8".to_string(),
        )],
        status,
    )
}

/// Replace the first case-insensitive occurrence or append.
fn upsert(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
    {
        Some(entry) => entry.1 = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// ±3 lines of source around the origin, best-effort.
fn source_snippet(file: &str, line: usize) -> Option<String> {
    let content = std::fs::read_to_string(file).ok()?;
    let start = line.saturating_sub(3).max(1);
    let rows: Vec<String> = content
        .lines()
        .enumerate()
        .filter_map(|(index, text)| {
            let number = index + 1;
            if number < start || number > line + 3 {
                return None;
            }
            let marker = if number == line { '>' } else { ' ' };
            Some(format!("{marker}{number:>5} | {text}"))
        })
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(rows.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_case_insensitively() {
        let mut headers = vec![("Content-Type".to_string(), "a".to_string())];
        upsert(&mut headers, "content-type", "b".to_string());
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].1, "b");
    }

    #[test]
    fn snippet_marks_the_origin_line() {
        let snippet = source_snippet("src/dispatcher/core.rs", 5).expect("snippet");
        assert!(snippet.lines().any(|l| l.starts_with('>')));
        assert!(snippet.lines().count() <= 7);
    }

}
