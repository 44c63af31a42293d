//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use ak_core::{EngineConfig, Error, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// JSON file with flow definitions loaded at startup.
    pub flows_file: Option<PathBuf>,

    /// Policy names the static policy engine denies.
    pub denied_policies: Vec<String>,

    /// CORS allowed origins (comma-separated).
    pub cors_origins: Vec<String>,

    /// Seconds between sweeps of expired plans.
    pub purge_interval_seconds: u64,

    /// Hosts an absolute `next` URL may point to. Relative paths are always
    /// accepted.
    pub redirect_hosts: Vec<String>,

    /// Log level.
    pub log_level: String,

    /// Flow engine configuration.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// | Variable          | Default   |
    /// |-------------------|-----------|
    /// | `AK_HOST`         | `0.0.0.0` |
    /// | `AK_PORT`         | `9000`    |
    /// | `AK_FLOWS_FILE`   | unset     |
    /// | `AK_POLICY_DENY`  | empty     |
    /// | `AK_CORS_ORIGINS` | `*`       |
    /// | `AK_PURGE_INTERVAL` | `60`    |
    /// | `AK_REDIRECT_HOSTS` | empty   |
    /// | `RUST_LOG`        | `info`    |
    ///
    /// ## Errors
    ///
    /// Returns `Error::Config` if `AK_PORT` is set but not a port number.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = std::env::var("AK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("AK_PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| Error::Config(format!("AK_PORT is not a valid port: {port}")))?,
            Err(_) => 9000,
        };

        let flows_file = std::env::var("AK_FLOWS_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let denied_policies = std::env::var("AK_POLICY_DENY")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let cors_origins = std::env::var("AK_CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let purge_interval_seconds = std::env::var("AK_PURGE_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &u64| *v > 0)
            .unwrap_or(60);

        let redirect_hosts = std::env::var("AK_REDIRECT_HOSTS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            flows_file,
            denied_policies,
            cors_origins,
            purge_interval_seconds,
            redirect_hosts,
            log_level,
            engine: EngineConfig::from_env(),
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            flows_file: None,
            denied_policies: Vec::new(),
            cors_origins: vec!["*".to_string()],
            purge_interval_seconds: 60,
            redirect_hosts: Vec::new(),
            log_level: "debug".to_string(),
            engine: EngineConfig::for_testing(),
        }
    }

    /// Returns the socket address to bind to.
    ///
    /// ## Errors
    ///
    /// Returns `Error::Config` if the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            flows_file: None,
            denied_policies: Vec::new(),
            cors_origins: vec!["*".to_string()],
            purge_interval_seconds: 60,
            redirect_hosts: Vec::new(),
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
