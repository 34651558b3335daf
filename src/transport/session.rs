//! SSH session establishment and per-request channels.
//!
//! # Responsibilities
//! - Dial and authenticate one SSH session per destination
//! - Verify the server host key against the active credential snapshot
//! - Open `direct-tcpip` byte-stream channels for individual round trips
//!
//! # Design Decisions
//! - Host-key verification fails closed: unknown hosts and changed keys both
//!   abort the handshake. There is no trust-on-first-use path.
//! - A session remembers the credential snapshot version it authenticated
//!   with; rotation never re-authenticates live sessions.
//! - Channels are cheap and per-request; the session outlives them all.

use std::fmt;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh::ChannelStream;
use uuid::Uuid;

use crate::credentials::{CredentialSnapshot, HostKeyVerification};
use crate::transport::error::TransportError;

/// A `host:port` pair identifying a dial target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub host: String,
    pub port: u16,
}

impl DestinationKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A live authenticated SSH session to one destination (or relay).
///
/// Shared by every concurrent request whose dial target matches; each request
/// opens its own channel.
pub struct SecureSession {
    id: Uuid,
    destination: DestinationKey,
    credential_version: u64,
    handle: Handle<ClientHandler>,
}

impl SecureSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn destination(&self) -> &DestinationKey {
        &self.destination
    }

    /// Version of the credential snapshot this session authenticated with.
    pub fn credential_version(&self) -> u64 {
        self.credential_version
    }

    /// Whether the underlying SSH transport is still usable.
    pub fn is_open(&self) -> bool {
        !self.handle.is_closed()
    }

    /// Open a fresh byte-stream channel to `host:port`, resolved by the
    /// remote side.
    pub async fn open_channel(
        &self,
        host: &str,
        port: u16,
    ) -> Result<ChannelStream<client::Msg>, TransportError> {
        let addr = format!("{host}:{port}");
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|e| TransportError::Channel {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(session = %self.id, channel_target = %addr, "channel opened");
        Ok(channel.into_stream())
    }
}

impl fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("credential_version", &self.credential_version)
            .finish()
    }
}

/// Dial and authenticate a new SSH session to `destination`.
pub async fn dial(
    destination: DestinationKey,
    user: String,
    snapshot: Arc<CredentialSnapshot>,
    connect_timeout: Duration,
) -> Result<SecureSession, TransportError> {
    let result = dial_inner(destination, user, snapshot, connect_timeout).await;
    match &result {
        Ok(_) => crate::observability::metrics::record_handshake("ok"),
        Err(err) => crate::observability::metrics::record_handshake(err.class()),
    }
    result
}

async fn dial_inner(
    destination: DestinationKey,
    user: String,
    snapshot: Arc<CredentialSnapshot>,
    connect_timeout: Duration,
) -> Result<SecureSession, TransportError> {
    let addr = destination.to_string();
    tracing::debug!(
        destination = %addr,
        credential_version = snapshot.version,
        "dialing ssh session"
    );

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| TransportError::Dial {
            addr: addr.clone(),
            reason: format!("failed to resolve address: {e}"),
        })?
        .next()
        .ok_or_else(|| TransportError::Dial {
            addr: addr.clone(),
            reason: "no address found".to_string(),
        })?;

    let ssh_config = client::Config {
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    };

    let handler = ClientHandler {
        destination: destination.clone(),
        snapshot: snapshot.clone(),
    };

    let mut handle = tokio::time::timeout(
        connect_timeout,
        client::connect(Arc::new(ssh_config), socket_addr, handler),
    )
    .await
    .map_err(|_| TransportError::Timeout { addr: addr.clone() })??;

    tracing::debug!(destination = %addr, "ssh handshake completed");

    let key = PrivateKeyWithHashAlg::new(snapshot.private_key.clone(), None);
    let authenticated = handle
        .authenticate_publickey(&user, key)
        .await
        .map_err(|e| TransportError::Auth {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

    if !authenticated.success() {
        return Err(TransportError::Auth {
            addr,
            reason: "public key rejected by server".to_string(),
        });
    }

    let session = SecureSession {
        id: Uuid::new_v4(),
        destination,
        credential_version: snapshot.version,
        handle,
    };
    tracing::info!(
        session = %session.id,
        destination = %addr,
        credential_version = session.credential_version,
        "ssh session established"
    );
    Ok(session)
}

/// russh callback handler; its only job here is host-key verification.
pub struct ClientHandler {
    destination: DestinationKey,
    snapshot: Arc<CredentialSnapshot>,
}

impl client::Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let verification = self.snapshot.trusted_hosts.verify(
            &self.destination.host,
            self.destination.port,
            server_public_key,
        );

        match verification {
            HostKeyVerification::Verified => {
                tracing::debug!(destination = %self.destination, "host key verified");
                Ok(true)
            }
            verification => {
                // Fail closed. A mismatch in particular may indicate an
                // impersonated destination.
                tracing::error!(
                    destination = %self.destination,
                    credential_version = self.snapshot.version,
                    %verification,
                    "host key verification failed, refusing session"
                );
                Err(TransportError::HostKey {
                    addr: self.destination.to_string(),
                    verification,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_key_display() {
        assert_eq!(
            DestinationKey::new("example.internal", 22).to_string(),
            "example.internal:22"
        );
        assert_eq!(
            DestinationKey::new("relay.example", 8080).to_string(),
            "relay.example:8080"
        );
    }

    #[test]
    fn test_destination_key_equality() {
        assert_eq!(
            DestinationKey::new("a.internal", 80),
            DestinationKey::new("a.internal".to_string(), 80)
        );
        assert_ne!(
            DestinationKey::new("a.internal", 80),
            DestinationKey::new("a.internal", 8080)
        );
    }
}
