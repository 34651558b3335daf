//! Secure transport subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline round trip
//!     → secure.rs (dial plan: direct destination or cascading relay)
//!     → pool.rs (one SSH session per destination, single-flight dial)
//!     → session.rs (handshake, host-key check, direct-tcpip channels)
//!     → credentials (snapshot read at dial time)
//! ```
//!
//! # Design Decisions
//! - The pipeline sees only the [`ClientTransport`] trait; the SSH machinery
//!   is swappable in tests.
//! - Trust failures (host-key verification) fail closed and are never folded
//!   into retry behavior.

pub mod error;
pub mod pool;
pub mod secure;
pub mod session;

use axum::body::Body;
use axum::http::{Request, Response};

pub use error::TransportError;
pub use pool::SessionPool;
pub use secure::{DialPlan, SecureTransport};
pub use session::{DestinationKey, SecureSession};

/// The round-trip capability the pipeline is written against: send one
/// request, get back the response with its body still streaming.
#[async_trait::async_trait]
pub trait ClientTransport: Send + Sync {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}
