//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration for the management gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Proxy targets, checked most specific prefix first.
    pub upstreams: Vec<UpstreamConfig>,

    /// Local directories served by the gateway.
    pub paths: PathsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Background worker settings.
    pub workers: WorkersConfig,

    /// Management API settings.
    pub mgmt: MgmtConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstreams: default_upstreams(),
            paths: PathsConfig::default(),
            timeouts: TimeoutConfig::default(),
            workers: WorkersConfig::default(),
            mgmt: MgmtConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// Listen port, overridden by `PORT`.
    pub port: u16,
}

impl ListenerConfig {
    /// Socket address to bind, or `None` when the host is not an IP literal.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2022,
        }
    }
}

/// A path prefix forwarded to a fixed upstream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Path prefix to match (`/` is the catch-all).
    pub prefix: String,

    /// Upstream base URL (e.g., "http://127.0.0.1:1985").
    pub target: String,
}

impl UpstreamConfig {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            target: target.into(),
        }
    }
}

fn default_upstreams() -> Vec<UpstreamConfig> {
    vec![
        // Streaming server HTTP API and WebRTC signaling.
        UpstreamConfig::new("/api/", "http://127.0.0.1:1985"),
        UpstreamConfig::new("/rtc/", "http://127.0.0.1:1985"),
        // Streaming server web surface (console, players, HTTP-FLV/HLS).
        UpstreamConfig::new("/", "http://127.0.0.1:8080"),
    ]
}

/// Local directories for static content.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Served under `/terraform/v1/sources/`.
    pub sources_dir: String,

    /// SPA build output, served under `/mgmt/`.
    pub ui_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources_dir: "./sources".to_string(),
            ui_dir: "./ui/build".to_string(),
        }
    }
}

/// Timeout configuration for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Whether backends run in containers. `USE_DOCKER=false` clears it and
    /// the container status worker is never started.
    pub use_docker: bool,

    /// Stop the whole process when a worker exits with a non-zero code.
    pub exit_on_failure: bool,

    /// Release metadata endpoint; no URL means no release checks.
    pub releases_url: Option<String>,

    /// Interval between release checks in seconds.
    pub releases_interval_secs: u64,

    /// Containers whose state is collected by the market worker.
    pub containers: Vec<String>,

    /// Interval between container status polls in seconds.
    pub market_interval_secs: u64,

    /// Scheduled maintenance jobs.
    pub crontab: Vec<CronJobConfig>,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            use_docker: true,
            exit_on_failure: true,
            releases_url: None,
            releases_interval_secs: 3600,
            containers: Vec::new(),
            market_interval_secs: 10,
            crontab: Vec::new(),
        }
    }
}

/// A maintenance command run on a fixed interval.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CronJobConfig {
    /// Job name for logging.
    pub name: String,

    /// Program to execute.
    pub command: String,

    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Run interval in seconds.
    #[serde(default = "default_job_interval")]
    pub interval_secs: u64,
}

fn default_job_interval() -> u64 {
    3600
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MgmtConfig {
    /// Bearer token required by protected endpoints. Unset disables the check.
    pub token: Option<String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for MgmtConfig {
    fn default() -> Self {
        Self {
            token: None,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
