//! View collaborator.
//!
//! Templates are HTML files under the configured views directory, rendered
//! with `minijinja` in strict-undefined mode: a placeholder referencing a
//! variable absent from the data map fails rendering with a missing-variable
//! error instead of printing an empty string.
//!
//! Outside production, the literal `@hotReload` placeholder expands to a
//! script (carrying the request's CSP nonce) that reconnects the page to the
//! `@/hot-reload` channel.

use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::Error;
use crate::ids::Nonce;

pub struct ViewRenderer {
    config: Arc<AppConfig>,
}

impl ViewRenderer {
    #[must_use]
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Render the named view file (`views/<name>.html`) with the data map.
    pub fn render(&self, view: &str, data: &Value, nonce: &Nonce) -> Result<String, Error> {
        let path = self.config.views_directory.join(format!("{view}.html"));
        let source = std::fs::read_to_string(&path)
            .map_err(|_| Error::runtime(format!("View '{view}' does not exist")))?;
        self.render_source(view, &source, data, nonce)
    }

    /// Render template source directly (used for views loaded elsewhere and
    /// the built-in diagnostic page).
    pub fn render_source(
        &self,
        name: &str,
        source: &str,
        data: &Value,
        nonce: &Nonce,
    ) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template("view.html", source)
            .map_err(|e| Error::runtime_in(name.to_string(), format!("invalid view '{name}': {e}")))?;
        let template = env
            .get_template("view.html")
            .map_err(|e| Error::runtime_in(name.to_string(), format!("invalid view '{name}': {e}")))?;
        let rendered = template.render(data).map_err(|e| {
            if matches!(e.kind(), minijinja::ErrorKind::UndefinedError) {
                Error::runtime_in(name.to_string(), format!("Missing variable in view '{name}'"))
            } else {
                Error::runtime_in(name.to_string(), format!("view '{name}' failed to render: {e}"))
            }
        })?;
        Ok(rendered.replace("@hotReload", &self.hot_reload_script(nonce)))
    }

    fn hot_reload_script(&self, nonce: &Nonce) -> String {
        if self.config.is_production || !self.config.hot_reload.enabled {
            return String::new();
        }
        format!(
            r#"<script nonce="{nonce}">
  const $hrSocket = new WebSocket('{url}');
  $hrSocket.onmessage = (event) => {{
    if (JSON.parse(event.data).channel === '@/hot-reload') {{
      window.location.reload();
    }}
  }};
  $hrSocket.onclose = () => console.error('[wharf] hot reload disconnected');
</script>"#,
            nonce = nonce.as_str(),
            url = self.config.web_socket_url(),
        )
    }
}
