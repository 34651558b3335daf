//! The secure transport: one HTTP round trip over an SSH channel.
//!
//! # Data Flow
//! ```text
//! OutboundRequest
//!     → DialPlan::resolve (direct destination, or relay when cascading)
//!     → SessionPool::acquire (single-flight SSH handshake, credential
//!       snapshot read at dial time)
//!     → SecureSession::open_channel (fresh direct-tcpip stream)
//!     → hyper http1 handshake over the stream → send_request
//!     → OutboundResponse (body still streaming through the channel)
//! ```
//!
//! # Design Decisions
//! - In cascading mode the request is forwarded verbatim to the relay's own
//!   proxy listener; the relay resolves the real destination, which makes
//!   multi-hop cascading plain composition with no depth tracking here.
//! - A failed channel or exchange evicts the session only when the session
//!   transport itself is closed; one bad channel does not condemn a healthy
//!   session.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::{Request, Response, Uri};
use hyper_util::rt::TokioIo;

use crate::config::SshConfig;
use crate::credentials::CredentialStore;
use crate::observability::metrics;
use crate::transport::error::TransportError;
use crate::transport::pool::SessionPool;
use crate::transport::session::{self, DestinationKey, SecureSession};
use crate::transport::ClientTransport;

/// Where a round trip's SSH session goes and what the channel inside it
/// targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialPlan {
    /// Host the SSH session is established to, on the configured SSH port.
    pub ssh_target: DestinationKey,
    /// Authority the direct-tcpip channel is opened to, resolved remotely.
    pub channel_target: DestinationKey,
}

impl DialPlan {
    /// Resolve the dial targets for a request.
    ///
    /// Without a relay, both targets derive from the request authority: SSH
    /// to the destination host itself, channel to its HTTP port. With a
    /// relay, the session goes to the relay host and the channel targets the
    /// relay's proxy listener verbatim.
    pub fn resolve(
        uri: &Uri,
        ssh_port: u16,
        next_proxy_addr: Option<&str>,
    ) -> Result<Self, TransportError> {
        if let Some(relay) = next_proxy_addr {
            let authority = Authority::from_str(relay)
                .map_err(|e| TransportError::Resolve(format!("bad relay address {relay:?}: {e}")))?;
            let port = authority.port_u16().ok_or_else(|| {
                TransportError::Resolve(format!("relay address {relay:?} is missing a port"))
            })?;
            return Ok(Self {
                ssh_target: DestinationKey::new(authority.host(), ssh_port),
                channel_target: DestinationKey::new(authority.host(), port),
            });
        }

        let host = uri
            .host()
            .ok_or_else(|| TransportError::Resolve(format!("request target {uri} has no host")))?;
        let port = uri.port_u16().unwrap_or(80);
        Ok(Self {
            ssh_target: DestinationKey::new(host, ssh_port),
            channel_target: DestinationKey::new(host, port),
        })
    }
}

/// HTTP client transport that reaches every upstream through SSH.
pub struct SecureTransport {
    config: SshConfig,
    credentials: Arc<CredentialStore>,
    pool: Arc<SessionPool<SecureSession>>,
}

impl SecureTransport {
    pub fn new(config: SshConfig, credentials: Arc<CredentialStore>) -> Self {
        Self {
            config,
            credentials,
            pool: Arc::new(SessionPool::new()),
        }
    }

    /// Number of pooled sessions and in-flight dials.
    pub fn pooled_sessions(&self) -> usize {
        self.pool.len()
    }

    async fn acquire_session(
        &self,
        plan: &DialPlan,
    ) -> Result<Arc<SecureSession>, TransportError> {
        let target = plan.ssh_target.clone();
        let user = self.config.user.clone();
        let credentials = self.credentials.clone();
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);

        self.pool
            .acquire(&plan.ssh_target, move || {
                // The snapshot is read per dial attempt so a reload is
                // observed by the very next handshake.
                let snapshot = credentials.active_snapshot();
                session::dial(target.clone(), user.clone(), snapshot, connect_timeout)
            })
            .await
    }
}

#[async_trait::async_trait]
impl ClientTransport for SecureTransport {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let plan = DialPlan::resolve(
            request.uri(),
            self.config.port,
            self.config.next_proxy_addr.as_deref(),
        )?;

        let session = self.acquire_session(&plan).await?;

        let stream = match session
            .open_channel(&plan.channel_target.host, plan.channel_target.port)
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                if !session.is_open() {
                    self.pool.evict(&plan.ssh_target, session.id());
                }
                return Err(err);
            }
        };

        let started = Instant::now();
        let (mut sender, conn) =
            hyper::client::conn::http1::Builder::new()
                .handshake(TokioIo::new(stream))
                .await?;

        // The connection task owns the channel and keeps streaming the
        // response body after round_trip returns; dropping the body aborts
        // it, which releases the channel without draining the rest.
        {
            let pool = self.pool.clone();
            let session = session.clone();
            let ssh_target = plan.ssh_target.clone();
            tokio::spawn(async move {
                if let Err(err) = conn.await {
                    tracing::debug!(
                        session = %session.id(),
                        error = %err,
                        "upstream connection ended with error"
                    );
                    if !session.is_open() {
                        pool.evict(&ssh_target, session.id());
                    }
                }
            });
        }

        match sender.send_request(request).await {
            Ok(response) => {
                metrics::record_round_trip(&plan.channel_target.host, started.elapsed());
                Ok(response.map(Body::new))
            }
            Err(err) => {
                if !session.is_open() {
                    self.pool.evict(&plan.ssh_target, session.id());
                }
                Err(TransportError::Exchange(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_plan_targets_the_request_authority() {
        let uri: Uri = "http://example.internal/status".parse().unwrap();
        let plan = DialPlan::resolve(&uri, 22, None).unwrap();
        assert_eq!(plan.ssh_target, DestinationKey::new("example.internal", 22));
        assert_eq!(
            plan.channel_target,
            DestinationKey::new("example.internal", 80)
        );
    }

    #[test]
    fn test_direct_plan_honors_explicit_port_and_ssh_port() {
        let uri: Uri = "http://example.internal:8080/".parse().unwrap();
        let plan = DialPlan::resolve(&uri, 2222, None).unwrap();
        assert_eq!(
            plan.ssh_target,
            DestinationKey::new("example.internal", 2222)
        );
        assert_eq!(
            plan.channel_target,
            DestinationKey::new("example.internal", 8080)
        );
    }

    #[test]
    fn test_cascading_plan_ignores_the_request_authority() {
        let uri: Uri = "http://target.internal/".parse().unwrap();
        let plan = DialPlan::resolve(&uri, 22, Some("relay.example:3128")).unwrap();
        assert_eq!(plan.ssh_target, DestinationKey::new("relay.example", 22));
        assert_eq!(
            plan.channel_target,
            DestinationKey::new("relay.example", 3128)
        );
    }

    #[test]
    fn test_relay_address_requires_a_port() {
        let uri: Uri = "http://target.internal/".parse().unwrap();
        let err = DialPlan::resolve(&uri, 22, Some("relay.example")).unwrap_err();
        assert!(matches!(err, TransportError::Resolve(_)));
    }

    #[test]
    fn test_plan_rejects_hostless_target() {
        let uri: Uri = "/status".parse().unwrap();
        let err = DialPlan::resolve(&uri, 22, None).unwrap_err();
        assert!(matches!(err, TransportError::Resolve(_)));
    }
}
