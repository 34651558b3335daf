//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Secure transport configuration (SSH identity and trust).
    pub ssh: SshConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Secure transport configuration.
///
/// Every upstream connection is carried over an SSH session authenticated
/// with this identity and verified against this trusted host-key database.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    /// Username used for connecting via SSH.
    pub user: String,

    /// Private key file used for connecting via SSH.
    pub key_file: String,

    /// Known hosts file used for host-key verification.
    pub known_hosts_file: String,

    /// Port used for connecting via SSH.
    pub port: u16,

    /// Optional address of another instance of this proxy; when set, every
    /// request is relayed through an SSH session to that host (cascading
    /// mode) instead of SSHing to the destination directly.
    pub next_proxy_addr: Option<String>,

    /// SSH connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            key_file: String::new(),
            known_hosts_file: String::new(),
            port: 22,
            next_proxy_addr: None,
            connect_timeout_secs: 10,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Metrics endpoint bind address; absent disables the endpoint.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
