//! Shared utilities for integration testing the proxy over real sockets.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use sshttp::config::ProxyConfig;
use sshttp::http::HttpServer;
use sshttp::transport::{ClientTransport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the transport saw for one round trip.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
}

type ResponseFactory =
    Box<dyn Fn() -> Result<Response<Body>, TransportError> + Send + Sync + 'static>;

/// Transport double: records every outbound request and replays a canned
/// outcome, so the full HTTP surface can be driven without a live sshd.
pub struct RecordingTransport {
    seen: Mutex<Vec<RecordedRequest>>,
    respond: ResponseFactory,
}

impl RecordingTransport {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn() -> Result<Response<Body>, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClientTransport for RecordingTransport {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        self.seen.lock().unwrap().push(RecordedRequest {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
        });
        (self.respond)()
    }
}

/// Start the proxy on an ephemeral port with the given transport.
pub async fn spawn_proxy(transport: Arc<RecordingTransport>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(ProxyConfig::default(), transport);
    tokio::spawn(async move {
        server
            .run(listener, std::future::pending())
            .await
            .unwrap();
    });

    addr
}

/// A raw HTTP exchange, one request per connection.
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Write `request` verbatim to the proxy and read the whole response.
///
/// Callers include `Connection: close` so the server ends the connection
/// after one exchange.
pub async fn send_raw(addr: SocketAddr, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();

    let (head, body) = text
        .split_once("\r\n\r\n")
        .expect("response has no header/body separator");
    let mut lines = head.lines();
    let status_line = lines.next().expect("response has no status line");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status line has no code");
    let headers = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}
