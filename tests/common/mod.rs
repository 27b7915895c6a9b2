//! Shared utilities for integration testing.
//!
//! The tests play the broker: they listen on an ephemeral port, let the
//! tunnel dial in, write raw HTTP/1.1 requests and read the raw replies.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reverse_tunnel::{ClientConfig, Shutdown, Tunnel};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl BackendRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response as read back by the broker.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Read a header block: lines up to the blank line, as lowercase name/value pairs.
async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<(String, Vec<(String, String)>)> {
    let mut start = String::new();
    if reader.read_line(&mut start).await.ok()? == 0 {
        return None;
    }

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }

    Some((start.trim_end().to_string(), headers))
}

async fn read_body<R: AsyncBufRead + Unpin>(reader: &mut R, headers: &[(String, String)]) -> Vec<u8> {
    let len = find_header(headers, "content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.unwrap();
    body
}

/// Read one HTTP/1.1 response framed by Content-Length.
pub async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> RawResponse {
    let (status_line, headers) = tokio::time::timeout(Duration::from_secs(5), read_head(reader))
        .await
        .expect("timed out waiting for response")
        .expect("connection closed before response");

    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("bad status line: {status_line}"));
    let body = read_body(reader, &headers).await;

    RawResponse { status, headers, body }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// Every response carries `Connection: close` and the socket is closed after it.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(BackendRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut socket = BufReader::new(socket);
                        let Some((request_line, headers)) = read_head(&mut socket).await else {
                            return;
                        };
                        let _ = read_body(&mut socket, &headers).await;

                        let mut parts = request_line.split_whitespace();
                        let request = BackendRequest {
                            method: parts.next().unwrap_or_default().to_string(),
                            path: parts.next().unwrap_or_default().to_string(),
                            headers,
                        };

                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let mut socket = socket.into_inner();
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend that always answers 200 with `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config for a tunnel dialing `broker` and delivering to `backend`.
pub fn client_config(broker: SocketAddr, backend: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.tunnel.remote = broker.to_string();
    config.tunnel.local = format!("http://{}", backend);
    config.pool.max_connections = Some(1);
    config.pool.dial_retry_ms = 100;
    config.pool.dial_timeout_secs = 2;
    config
}

/// A running tunnel and the handle to stop it.
pub struct RunningTunnel {
    pub tunnel: Arc<Tunnel>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl RunningTunnel {
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("tunnel did not stop")
            .unwrap();
    }
}

pub fn start_tunnel(config: ClientConfig) -> RunningTunnel {
    let tunnel = Arc::new(Tunnel::new(config).unwrap());
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let running = tunnel.clone();
    let task = tokio::spawn(async move { running.run(signal).await });

    RunningTunnel { tunnel, shutdown, task }
}

/// Accept the next tunnel connection, failing the test after 5 seconds.
pub async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("tunnel did not connect")
        .unwrap();
    stream
}

/// Poll `cond` until it holds, failing the test after 5 seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
