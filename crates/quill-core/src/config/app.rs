//! Server and CORS configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout in seconds for verify and chunk requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Timeout in seconds for merge requests, which stream whole files.
    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_seconds: u64,
    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Merge timeout as a [`Duration`].
    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            merge_timeout_seconds: default_merge_timeout(),
            cors: CorsConfig::default(),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins (use `["*"]` for development only).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods.
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    /// Allowed HTTP headers.
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            max_age_seconds: default_max_age(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    60
}

fn default_merge_timeout() -> u64 {
    600
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allowed_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()]
}

fn default_allowed_headers() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_age() -> u64 {
    3600
}
