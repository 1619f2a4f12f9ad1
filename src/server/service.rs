//! The HTTP service: raw request in, envelope out.
//!
//! One `call` per request: extract the raw parts, build a
//! [`RequestContext`], hand it to the dispatcher, write the resulting
//! envelope back through `may_minihttp`.

use std::collections::HashMap;
use std::io;
use std::io::Read as _;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use may_minihttp::{HttpService, Request, Response};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::http::{RequestContext, ResponseEnvelope};

#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<AppConfig>,
}

/// Extract method, target, headers (lowercase, multi-valued) and body bytes.
fn build_context(req: Request) -> RequestContext {
    let method = req
        .method()
        .parse::<Method>()
        .unwrap_or(Method::GET);
    let target = req.path().to_string();

    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for header in req.headers() {
        headers
            .entry(header.name.to_ascii_lowercase())
            .or_default()
            .push(String::from_utf8_lossy(header.value).to_string());
    }

    let mut body = Vec::new();
    let _ = req.body().read_to_end(&mut body);
    let body = if body.is_empty() { None } else { Some(body) };

    RequestContext::new(method, &target, headers, body.as_deref())
}

fn write_envelope(res: &mut Response, envelope: ResponseEnvelope) {
    let status = envelope.status();
    let reason = status.canonical_reason().unwrap_or("OK");
    res.status_code(status.as_u16() as usize, reason);

    for (name, value) in envelope.headers() {
        // The transport computes its own content-length from the body.
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }

    res.body_vec(envelope.into_body().into_bytes());
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let started = Instant::now();
        let context = build_context(req);
        let envelope = self.dispatcher.respond(&context);

        if self.config.logger.enabled {
            let is_static = context
                .is_static_file_request(&self.config.static_files_directory);
            if !is_static || self.config.logger.static_file_requests {
                let status = envelope.status().as_u16();
                let elapsed = started.elapsed();
                let elapsed = if elapsed.as_secs() >= 1 {
                    format!("{:.1}s", elapsed.as_secs_f64())
                } else {
                    format!("{:.1}ms", elapsed.as_secs_f64() * 1000.0)
                };
                if status >= 500 {
                    warn!(status, method = %context.method(), path = %context.path(), %elapsed, "request");
                } else {
                    info!(status, method = %context.method(), path = %context.path(), %elapsed, "request");
                }
            }
        }

        write_envelope(res, envelope);
        Ok(())
    }
}
