//! # Application Configuration
//!
//! Configuration is a plain serde tree with defaults for every field, so a
//! service can start with no config file at all. Sources are merged in
//! order:
//!
//! 1. [`AppConfig::default()`]
//! 2. an optional YAML file ([`AppConfig::from_yaml_file`])
//! 3. environment overrides ([`AppConfig::apply_env`])
//!
//! ## Environment Variables
//!
//! - `HOST` / `PORT`: bind address
//! - `WHARF_PRODUCTION`: `true`/`1` switches the runtime into production
//!   mode (terse error surface, no hot reload)
//! - `WHARF_STACK_SIZE`: coroutine stack size, decimal (`16384`) or
//!   hexadecimal (`0x4000`)
//!
//! Durations expressed as `max_age` fields are in **days**; they are
//! converted to seconds where the corresponding header is emitted.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

const DEFAULT_STACK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub is_production: bool,
    pub cache: CacheConfig,
    pub content_security_policy: CspConfig,
    pub cookies: CookieConfig,
    pub cors: CorsConfig,
    /// Extra headers stamped on every response (base-header tier).
    pub global_headers: HashMap<String, String>,
    pub logger: LoggerConfig,
    pub static_files_directory: PathBuf,
    pub views_directory: PathBuf,
    pub tls: TlsConfig,
    pub web_socket: WebSocketConfig,
    pub hot_reload: HotReloadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Static file cache lifetime, in days.
    pub max_age: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CspConfig {
    pub enabled: bool,
    pub allow_inline_scripts: bool,
    pub allow_inline_styles: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie lifetime, in days.
    pub max_age: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_credentials: bool,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub exposed_headers: Vec<String>,
    /// Preflight cache lifetime, in seconds (goes out verbatim).
    pub max_age: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub enabled: bool,
    pub static_file_requests: bool,
    pub web_socket_connections: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotReloadConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5050,
            is_production: false,
            cache: CacheConfig::default(),
            content_security_policy: CspConfig::default(),
            cookies: CookieConfig::default(),
            cors: CorsConfig::default(),
            global_headers: HashMap::new(),
            logger: LoggerConfig::default(),
            static_files_directory: PathBuf::from("public"),
            views_directory: PathBuf::from("views"),
            tls: TlsConfig::default(),
            web_socket: WebSocketConfig::default(),
            hot_reload: HotReloadConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: 7,
        }
    }
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_inline_scripts: false,
            allow_inline_styles: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self { max_age: 30 }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_credentials: false,
            allowed_headers: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_origins: Vec::new(),
            exposed_headers: Vec::new(),
            max_age: 3600,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            static_file_requests: false,
            web_socket_connections: false,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_file: PathBuf::new(),
            key_file: PathBuf::new(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5051,
        }
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, on top of the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::configuration(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        serde_yaml::from_str(&text)
            .map_err(|e| Error::configuration(format!("invalid config file: {e}")))
    }

    /// Apply `HOST`, `PORT` and `WHARF_PRODUCTION` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = env::var("HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(prod) = env::var("WHARF_PRODUCTION") {
            self.is_production = matches!(prod.as_str(), "1" | "true" | "yes");
        }
    }

    /// Startup validation; violations are fatal configuration errors.
    pub fn validate(&self) -> Result<(), Error> {
        if self.tls.enabled {
            for (label, path) in [("cert", &self.tls.cert_file), ("key", &self.tls.key_file)] {
                if std::fs::metadata(path).is_err() {
                    return Err(Error::configuration(format!(
                        "failed to load TLS {label} file {}",
                        path.display()
                    )));
                }
            }
        }
        if self.web_socket.enabled && self.web_socket.port == self.port {
            return Err(Error::configuration(
                "web socket port must differ from the HTTP port",
            ));
        }
        Ok(())
    }

    /// `http(s)://host[:port]`; the port is elided in production where a
    /// fronting proxy owns the public address.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.tls.enabled { "https" } else { "http" };
        if self.is_production {
            format!("{scheme}://{}", self.host)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }

    /// `ws(s)://host:port` of the channel listener.
    #[must_use]
    pub fn web_socket_url(&self) -> String {
        let scheme = if self.tls.enabled { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.web_socket.port)
    }

    /// Coroutine stack size from `WHARF_STACK_SIZE` (decimal or `0x` hex).
    #[must_use]
    pub fn stack_size() -> usize {
        match env::var("WHARF_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(DEFAULT_STACK_SIZE)
                } else {
                    val.parse().unwrap_or(DEFAULT_STACK_SIZE)
                }
            }
            Err(_) => DEFAULT_STACK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_friendly() {
        let config = AppConfig::default();
        assert!(!config.is_production);
        assert_eq!(config.port, 5050);
        assert_eq!(config.cookies.max_age, 30);
        assert_eq!(config.base_url(), "http://localhost:5050");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "host: api.internal\nport: 8080\ncookies:\n  max_age: 1\n",
        )
        .expect("parse");
        assert_eq!(config.host, "api.internal");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cookies.max_age, 1);
        // Untouched sections keep their defaults.
        assert!(config.cache.enabled);
    }

    #[test]
    fn production_base_url_elides_port() {
        let config = AppConfig {
            is_production: true,
            ..AppConfig::default()
        };
        assert_eq!(config.base_url(), "http://localhost");
    }

    #[test]
    fn tls_validation_requires_readable_files() {
        let config = AppConfig {
            tls: TlsConfig {
                enabled: true,
                cert_file: PathBuf::from("/nonexistent/cert.pem"),
                key_file: PathBuf::from("/nonexistent/key.pem"),
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
