//! Transport error types.

use std::sync::Arc;

use thiserror::Error;

use crate::credentials::HostKeyVerification;

/// Everything that can go wrong between "request accepted" and "response
/// headers read". The pipeline maps all of these to one 502-class failure;
/// the variants exist for logging and metrics.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request target: {0}")]
    Resolve(String),

    #[error("connection to {addr} failed: {reason}")]
    Dial { addr: String, reason: String },

    #[error("connection to {addr} timed out")]
    Timeout { addr: String },

    #[error("authentication to {addr} failed: {reason}")]
    Auth { addr: String, reason: String },

    #[error("host key verification failed for {addr}: {verification}")]
    HostKey {
        addr: String,
        verification: HostKeyVerification,
    },

    #[error("ssh protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("failed to open channel to {addr}: {reason}")]
    Channel { addr: String, reason: String },

    #[error("http exchange failed: {0}")]
    Exchange(#[from] hyper::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A dial failure surfaced through the pool's shared in-flight handshake;
    /// every waiter of that handshake observes the same underlying error.
    #[error("{0}")]
    Pooled(Arc<TransportError>),
}

impl TransportError {
    /// True for failures of trust (host-key verification), which are logged
    /// at elevated severity and must never be downgraded to "proceed anyway".
    pub fn is_trust_failure(&self) -> bool {
        match self {
            TransportError::HostKey { .. } => true,
            TransportError::Pooled(inner) => inner.is_trust_failure(),
            _ => false,
        }
    }

    /// Short class label for metrics.
    pub fn class(&self) -> &'static str {
        match self {
            TransportError::Resolve(_) => "resolve",
            TransportError::Dial { .. } => "dial",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Auth { .. } => "auth",
            TransportError::HostKey { .. } => "host_key",
            TransportError::Protocol(_) => "protocol",
            TransportError::Channel { .. } => "channel",
            TransportError::Exchange(_) => "exchange",
            TransportError::Io(_) => "io",
            TransportError::Pooled(inner) => inner.class(),
        }
    }
}
