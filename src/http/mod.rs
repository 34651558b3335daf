//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → pipeline.rs (normalize target → build upstream request
//!                    → round trip → forward response)
//!     → transport (SSH-carried exchange)
//! ```

pub mod pipeline;
pub mod server;

pub use pipeline::{PipelineError, ProxyRequest};
pub use server::{AppState, HttpServer};
