//! HTTP server setup and the network-facing proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all proxy route
//! - Wire up middleware (tracing, request timeout)
//! - Serve with graceful shutdown
//! - Construct one pipeline per inbound request and report its failures
//!
//! # Design Decisions
//! - The handler is stateless across requests; it holds only the shared
//!   client transport.
//! - No retries: one inbound request is one upstream attempt.
//! - Failure responses carry the status class only; cause detail is logged,
//!   never written into the body.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::pipeline::{PipelineError, ProxyRequest};
use crate::observability::metrics;
use crate::transport::ClientTransport;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn ClientTransport>,
}

/// HTTP server for the forward proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server around the given transport.
    pub fn new(config: ProxyConfig, transport: Arc<dyn ClientTransport>) -> Self {
        let state = AppState { transport };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "proxy listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("proxy stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler: one pipeline per request, no retries.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let target = request.uri().to_string();
    let protocol = request.version();

    let pipeline = ProxyRequest::new(state.transport.clone(), request);
    match pipeline.handle().await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            response
        }
        Err(err) => {
            let status = err.status();
            tracing::warn!(
                method = %method,
                url = %target,
                protocol = ?protocol,
                error = %err,
                "request failed"
            );
            if let PipelineError::RoundTrip(transport_err) = &err {
                metrics::record_transport_failure(transport_err.class());
            }
            metrics::record_request(method.as_str(), status.as_u16(), start);
            status.into_response()
        }
    }
}
