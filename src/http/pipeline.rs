//! Per-request proxy pipeline.
//!
//! # Responsibilities
//! - Derive the absolute target URL from the inbound request
//! - Build the sanitized upstream request (hop-by-hop headers removed)
//! - Perform exactly one round trip through the secure transport
//! - Forward the upstream response, recomputing body framing
//!
//! # Design Decisions
//! - Stages run strictly in order; each stage can end the request with a
//!   typed failure mapped to one status class (500 local, 502 transport).
//! - The transport's failure sub-causes are never distinguished to the
//!   client; detail goes to the log only.
//! - `Content-Length` from upstream is dropped: the framing of the body the
//!   caller receives reflects the bytes actually streamed, not the
//!   upstream-declared value.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, request, Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use thiserror::Error;

use crate::transport::{ClientTransport, TransportError};

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The inbound request could not be translated into an upstream request;
    /// nothing was sent anywhere.
    #[error("failed to construct upstream request: {0}")]
    BuildRequest(String),

    /// The transport could not complete the exchange (dial, auth, host key,
    /// channel, or upstream I/O).
    #[error("upstream request failed: {0}")]
    RoundTrip(#[from] TransportError),
}

impl PipelineError {
    /// Status class reported to the caller. Internal detail stays in logs.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::BuildRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::RoundTrip(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// One inbound request moving through the four pipeline stages.
pub struct ProxyRequest {
    transport: Arc<dyn ClientTransport>,
    request: Request<Body>,
}

impl ProxyRequest {
    pub fn new(transport: Arc<dyn ClientTransport>, request: Request<Body>) -> Self {
        Self { transport, request }
    }

    /// Run the pipeline to completion, producing the caller-facing response.
    pub async fn handle(self) -> Result<Response<Body>, PipelineError> {
        let (parts, body) = self.request.into_parts();

        let target = normalize_target(&parts)?;
        tracing::debug!(
            method = %parts.method,
            url = %target,
            protocol = ?parts.version,
            "handling request"
        );

        let upstream_request = build_upstream_request(&parts, target, body)?;
        let upstream_response = self.transport.round_trip(upstream_request).await?;

        Ok(forward_response(upstream_response))
    }
}

/// Derive the absolute target URL, forcing plain HTTP.
///
/// Forward-proxy requests arrive either in absolute form or with the target
/// implied by the `Host` header; both resolve here. CONNECT-style scheme
/// upgrades are out of scope, so any inbound scheme becomes `http`.
fn normalize_target(parts: &request::Parts) -> Result<Uri, PipelineError> {
    let authority = parts
        .uri
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            parts
                .headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            PipelineError::BuildRequest("request carries no target host".to_string())
        })?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme("http")
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| PipelineError::BuildRequest(format!("invalid target url: {e}")))
}

/// Build the upstream request: same method and body, headers copied minus
/// `Connection` and anything `Proxy-`-prefixed.
fn build_upstream_request(
    parts: &request::Parts,
    target: Uri,
    body: Body,
) -> Result<Request<Body>, PipelineError> {
    let mut upstream = Request::builder()
        .method(parts.method.clone())
        .uri(target)
        .body(body)
        .map_err(|e| PipelineError::BuildRequest(e.to_string()))?;

    let headers = upstream.headers_mut();
    for (name, value) in parts.headers.iter() {
        if name == header::CONNECTION || name.as_str().starts_with("proxy-") {
            tracing::debug!(header = %name, "dropping hop-by-hop request header");
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    Ok(upstream)
}

/// Forward the upstream response: status and headers pass through except
/// `Content-Length`, which is recomputed from the bytes actually streamed.
fn forward_response(upstream: Response<Body>) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();

    if parts.headers.remove(header::CONTENT_LENGTH).is_some() {
        tracing::debug!("dropping upstream content-length");
    }

    // The status line is committed before the body finishes streaming; a
    // stream error past this point can only truncate the body, so it is
    // recorded here rather than surfaced as a status.
    let body = Body::new(body.map_err(|err| {
        tracing::error!(error = %err, "failed to forward response body");
        err
    }));

    Response::from_parts(parts, body)
}
