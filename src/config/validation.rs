//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that addresses parse and required SSH identity fields are present
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: `ProxyConfig → Result<(), Vec<ValidationError>>`
//! - Runs before the config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;

use crate::config::schema::ProxyConfig;

/// One semantic problem with a configuration.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("not a valid socket address: {:?}", config.listener.bind_address),
        });
    }

    if config.ssh.user.is_empty() {
        errors.push(ValidationError {
            field: "ssh.user",
            message: "is required".to_string(),
        });
    }
    if config.ssh.key_file.is_empty() {
        errors.push(ValidationError {
            field: "ssh.key_file",
            message: "is required".to_string(),
        });
    }
    if config.ssh.known_hosts_file.is_empty() {
        errors.push(ValidationError {
            field: "ssh.known_hosts_file",
            message: "is required".to_string(),
        });
    }
    if config.ssh.port == 0 {
        errors.push(ValidationError {
            field: "ssh.port",
            message: "must be non-zero".to_string(),
        });
    }
    if config.ssh.connect_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "ssh.connect_timeout_secs",
            message: "must be non-zero".to_string(),
        });
    }

    if let Some(relay) = &config.ssh.next_proxy_addr {
        match Authority::from_str(relay) {
            Ok(authority) if authority.port_u16().is_some() => {}
            Ok(_) => errors.push(ValidationError {
                field: "ssh.next_proxy_addr",
                message: format!("missing a port: {relay:?}"),
            }),
            Err(e) => errors.push(ValidationError {
                field: "ssh.next_proxy_addr",
                message: format!("not a valid authority: {e}"),
            }),
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: "must be non-zero".to_string(),
        });
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "observability.metrics_address",
                message: format!("not a valid socket address: {addr:?}"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
