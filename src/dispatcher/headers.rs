//! Security header computation.
//!
//! Every HTTP response carries a fixed security header set plus computed
//! CSP and CORS headers. CSP is only emitted when enabled in configuration;
//! each directive admits `'self'`, the request's per-request nonce (or
//! `'unsafe-inline'` where inline content is explicitly allowed) and the
//! configured extra origins. Outside production the directives also admit
//! the dev server's own http(s)/ws(s) origin so hot-reload sockets aren't
//! blocked.

use crate::config::AppConfig;
use crate::http::RequestContext;

const PERMISSIONS_POLICY: &str = "autoplay=(self), camera=(), encrypted-media=(self), \
     geolocation=(self), microphone=(), payment=(), sync-xhr=(self)";

/// The full security header set for one response, CORS included.
#[must_use]
pub fn security_headers(config: &AppConfig, request: &RequestContext) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::with_capacity(16);

    if config.content_security_policy.enabled {
        headers.push((
            "content-security-policy".to_string(),
            csp_value(config, request),
        ));
    }
    for (name, value) in [
        ("cross-origin-opener-policy", "same-origin"),
        ("cross-origin-resource-policy", "same-origin"),
        ("origin-agent-cluster", "?1"),
        ("permissions-policy", PERMISSIONS_POLICY),
        ("referrer-policy", "no-referrer"),
        (
            "strict-transport-security",
            "max-age=31536000; includeSubDomains",
        ),
        ("x-content-type-options", "nosniff"),
        ("x-dns-prefetch-control", "off"),
        ("x-xss-protection", "0"),
    ] {
        headers.push((name.to_string(), value.to_string()));
    }
    headers.extend(cors_headers(config, request));
    headers
}

fn csp_value(config: &AppConfig, request: &RequestContext) -> String {
    let csp = &config.content_security_policy;
    let nonce = format!("'nonce-{}'", request.nonce());

    // Extra origins every directive admits: the configured list, plus the
    // dev server's own http/ws origin outside production.
    let mut origins = csp.allowed_origins.join(" ");
    if !config.is_production {
        let (http_scheme, ws_scheme) = if config.tls.enabled {
            ("https", "wss")
        } else {
            ("http", "ws")
        };
        if !origins.is_empty() {
            origins.push(' ');
        }
        origins.push_str(&format!(
            "{http_scheme}://{host}:* {ws_scheme}://{host}:*",
            host = config.host
        ));
    }

    let script_source = if csp.allow_inline_scripts {
        "'unsafe-inline'".to_string()
    } else {
        nonce.clone()
    };
    let style_source = if csp.allow_inline_styles {
        "'unsafe-inline'".to_string()
    } else {
        nonce.clone()
    };

    let directives: Vec<(&str, String)> = vec![
        ("base-uri", "'self'".to_string()),
        ("default-src", format!("'self' {nonce} {origins}")),
        ("script-src", format!("'self' {script_source} {origins}")),
        ("style-src", format!("'self' {style_source} {origins}")),
        ("font-src", format!("'self' {nonce} {origins} https: data:")),
        ("connect-src", format!("'self' {nonce} {origins}")),
        ("frame-ancestors", "'self'".to_string()),
        ("object-src", "'none'".to_string()),
        ("form-action", "'self'".to_string()),
        ("img-src", "*".to_string()),
        ("media-src", "'self'".to_string()),
        ("upgrade-insecure-requests", String::new()),
    ];

    directives
        .into_iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.to_string()
            } else {
                format!("{key} {}", value.split_whitespace().collect::<Vec<_>>().join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// CORS headers computed from configuration and the request's `Origin`.
///
/// `access-control-allow-origin` is emitted only when the origin is in the
/// allow-list (or the list is wildcard); `allow-headers` falls back to
/// echoing the preflight's requested headers when none are configured;
/// `vary: origin` is added unless all methods are wildcard-allowed.
#[must_use]
pub fn cors_headers(config: &AppConfig, request: &RequestContext) -> Vec<(String, String)> {
    let cors = &config.cors;
    let mut headers: Vec<(String, String)> = Vec::with_capacity(7);

    headers.push((
        "access-control-allow-credentials".to_string(),
        cors.allow_credentials.to_string(),
    ));

    let allow_headers = if cors.allowed_headers.is_empty() {
        request
            .header("access-control-request-headers")
            .unwrap_or("")
            .to_string()
    } else {
        cors.allowed_headers.join(",")
    };
    headers.push(("access-control-allow-headers".to_string(), allow_headers));

    if !cors.allowed_methods.is_empty() {
        headers.push((
            "access-control-allow-methods".to_string(),
            cors.allowed_methods.join(","),
        ));
    }

    let wildcard = cors.allowed_origins.first().map(String::as_str) == Some("*");
    let request_origin = request.header("origin").unwrap_or("");
    if wildcard {
        headers.push(("access-control-allow-origin".to_string(), "*".to_string()));
    } else if !request_origin.is_empty()
        && cors.allowed_origins.iter().any(|o| o == request_origin)
    {
        headers.push((
            "access-control-allow-origin".to_string(),
            request_origin.to_string(),
        ));
    }

    if !cors.exposed_headers.is_empty() {
        headers.push((
            "access-control-expose-headers".to_string(),
            cors.exposed_headers.join(","),
        ));
    }

    headers.push((
        "access-control-max-age".to_string(),
        cors.max_age.to_string(),
    ));

    if !cors.allowed_methods.iter().any(|m| m == "*") {
        headers.push(("vary".to_string(), "origin".to_string()));
    }

    headers
}
