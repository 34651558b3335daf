//! Credential state for the secure transport.
//!
//! # Data Flow
//! ```text
//! key file + known_hosts file
//!     → store.rs (parse both, all-or-nothing)
//!     → CredentialSnapshot (immutable key + trusted host keys)
//!     → read by the session pool at dial time
//!
//! SIGHUP → store.rs reload → atomic snapshot swap
//!     → observed by future dials only
//! ```

pub mod known_hosts;
pub mod store;

pub use known_hosts::{HostKeyVerification, KnownHostsError, TrustedHostKeys};
pub use store::{CredentialError, CredentialSnapshot, CredentialStore};
