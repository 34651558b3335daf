//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline + transport produce:
//!     → tracing events (structured fields, initialized in main)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Internal failure detail (hosts, error text) goes to logs and metrics
//!   only; response bodies to proxy clients never carry it.
//! - Trust failures log at error severity, ordinary request failures at warn.

pub mod metrics;
