//! Integration tests: the full proxy surface over real sockets, with the
//! secure transport replaced by a recording double.

mod common;

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use common::{send_raw, spawn_proxy, RecordingTransport};
use sshttp::credentials::HostKeyVerification;
use sshttp::transport::TransportError;

fn upstream_ok() -> Result<Response<Body>, TransportError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_LENGTH, "9999")
        .header("x-upstream", "yes")
        .body(Body::from("ok"))
        .unwrap())
}

#[tokio::test]
async fn test_forward_proxy_round_trip_sanitizes_request() {
    let transport = RecordingTransport::new(upstream_ok);
    let addr = spawn_proxy(transport.clone()).await;

    let response = send_raw(
        addr,
        "GET http://example.internal/status HTTP/1.1\r\n\
         Host: example.internal\r\n\
         Proxy-Connection: keep-alive\r\n\
         X-Trace: abc\r\n\
         Connection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 1);
    let upstream = &recorded[0];
    assert_eq!(upstream.method, "GET");
    assert_eq!(upstream.uri, "http://example.internal/status");
    assert!(upstream.headers.get("proxy-connection").is_none());
    assert!(upstream.headers.get("connection").is_none());
    assert_eq!(
        upstream.headers.get("x-trace").and_then(|v| v.to_str().ok()),
        Some("abc")
    );
}

#[tokio::test]
async fn test_content_length_reflects_streamed_bytes() {
    let transport = RecordingTransport::new(upstream_ok);
    let addr = spawn_proxy(transport).await;

    let response = send_raw(
        addr,
        "GET http://example.internal/ HTTP/1.1\r\n\
         Host: example.internal\r\n\
         Connection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
    // The upstream declared 9999; the caller must never see that value.
    assert_ne!(response.header("content-length"), Some("9999"));
    // Other upstream headers pass through.
    assert_eq!(response.header("x-upstream"), Some("yes"));
}

#[tokio::test]
async fn test_transport_failure_yields_bad_gateway_without_detail() {
    let transport = RecordingTransport::new(|| {
        Err(TransportError::Dial {
            addr: "example.internal:22".to_string(),
            reason: "connection refused".to_string(),
        })
    });
    let addr = spawn_proxy(transport).await;

    let response = send_raw(
        addr,
        "GET http://example.internal/ HTTP/1.1\r\n\
         Host: example.internal\r\n\
         Connection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.status, 502);
    // Internal cause detail never leaks into the body.
    assert!(response.body.is_empty());
    assert!(!response.body.contains("example.internal"));
}

#[tokio::test]
async fn test_trust_failure_yields_bad_gateway() {
    let transport = RecordingTransport::new(|| {
        Err(TransportError::HostKey {
            addr: "example.internal:22".to_string(),
            verification: HostKeyVerification::Unknown {
                fingerprint: "SHA256:dBb8nWvCH3MmdTHRRiZhSpsSOYdcYGD9gjNxRohPr0A".to_string(),
            },
        })
    });
    let addr = spawn_proxy(transport).await;

    let response = send_raw(
        addr,
        "GET http://example.internal/ HTTP/1.1\r\n\
         Host: example.internal\r\n\
         Connection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.status, 502);
}

#[tokio::test]
async fn test_hostless_request_fails_locally() {
    let transport = RecordingTransport::new(upstream_ok);
    let addr = spawn_proxy(transport.clone()).await;

    // HTTP/1.0 permits requests without a Host header; with no target
    // authority the pipeline must fail before reaching the transport.
    let response = send_raw(addr, "GET /status HTTP/1.0\r\n\r\n").await;

    assert_eq!(response.status, 500);
    assert!(transport.recorded().is_empty());
}

#[tokio::test]
async fn test_host_header_form_resolves_the_target() {
    let transport = RecordingTransport::new(upstream_ok);
    let addr = spawn_proxy(transport.clone()).await;

    let response = send_raw(
        addr,
        "GET /api?q=1 HTTP/1.1\r\n\
         Host: example.internal:8080\r\n\
         Connection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.status, 200);
    let recorded = transport.recorded();
    assert_eq!(recorded[0].uri, "http://example.internal:8080/api?q=1");
}
