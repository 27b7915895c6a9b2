//! Response construction for the tunnel wire.
//!
//! Every exchange on a tunnel connection ends in exactly one of these
//! responses. `wire.rs` serializes them onto the connection; this module makes
//! sure what it serializes is fully framed and keeps the connection alive:
//! - bodies are buffered, so `Content-Length` is always known
//! - `Connection: keep-alive` is always present
//! - a backend body that fails mid-read still yields a reply (502)

use axum::body::{Body, Bytes};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};

/// Body of the diagnostic reply.
pub const PING_BODY: &str = "OK";

/// Overwrite whatever `Connection` header is present with `keep-alive`.
pub fn force_keep_alive(headers: &mut HeaderMap) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
}

/// Fixed reply to the diagnostic path.
pub fn ping() -> Response<Body> {
    let mut response = Response::new(Body::from(PING_BODY));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(PING_BODY.len()));
    force_keep_alive(headers);
    response
}

/// Synthesized reply when the backend cannot be reached.
pub fn bad_gateway() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
    force_keep_alive(headers);
    response
}

/// Buffer a backend response into one that can go back onto the tunnel.
///
/// Reading the body to the end hands the backend connection back to the
/// client's pool. A body error is answered with [`bad_gateway`].
pub async fn relay(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(Body::new(body), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(status = %parts.status, error = %e, "Failed to read backend response body");
            return bad_gateway();
        }
    };

    let status = parts.status;
    let mut response = Response::from_parts(parts, ());
    frame(response.headers_mut(), status, &bytes);
    response.map(|()| Body::from(bytes))
}

/// Fix the framing headers of a fully buffered body.
pub(crate) fn frame(headers: &mut HeaderMap, status: StatusCode, body: &Bytes) {
    headers.remove(header::TRANSFER_ENCODING);
    if !headers.contains_key(header::CONTENT_LENGTH) && status_has_body(status) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    force_keep_alive(headers);
}

fn status_has_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}
