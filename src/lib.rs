//! sshttp: a forward HTTP proxy carried entirely over SSH.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                      SSHTTP                        │
//!                    │                                                    │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌────────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ pipeline │──▶│    secure      │  │
//!                    │  │ server  │   │ 4 stages │   │   transport    │  │
//!                    │  └─────────┘   └──────────┘   └───────┬────────┘  │
//!                    │                                       │           │
//!                    │                                       ▼           │
//!                    │                               ┌────────────────┐  │     SSH      ┌──────────┐
//!                    │                               │ session pool   │──┼──────────────▶ sshd on  │
//!                    │                               │ (single-flight)│  │ direct-tcpip │ dest or  │
//!                    │                               └───────┬────────┘  │   channel    │  relay   │
//!                    │                                       │           │              └──────────┘
//!                    │                                       ▼           │
//!                    │                               ┌────────────────┐  │
//!                    │                               │  credentials   │  │
//!                    │                               │ (swap on HUP)  │  │
//!                    │                               └────────────────┘  │
//!                    │                                                    │
//!                    │  ┌──────────────────────────────────────────────┐ │
//!                    │  │  cross-cutting: config · observability ·     │ │
//!                    │  │                 lifecycle (signals/shutdown) │ │
//!                    │  └──────────────────────────────────────────────┘ │
//!                    └────────────────────────────────────────────────────┘
//! ```
//!
//! The proxy never opens a plain TCP connection to a destination: each
//! upstream round trip is one HTTP/1.1 exchange over a fresh `direct-tcpip`
//! channel inside a pooled, host-key-verified SSH session. With a relay
//! configured, the session goes to the relay instead and the request is
//! forwarded verbatim to the proxy instance running there.

// Core subsystems
pub mod config;
pub mod http;
pub mod transport;

// Trust and credential state
pub mod credentials;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use credentials::CredentialStore;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::SecureTransport;
