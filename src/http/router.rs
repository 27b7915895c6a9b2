//! Dispatch of relayed requests.
//!
//! The broker checks tunnel connections with a request that has no Host and
//! the reserved [`PING_PATH`]. Those are answered here without touching the
//! backend; everything else goes to the [`Forwarder`].

use axum::body::Body;
use axum::http::{header, Request, Response};

use crate::http::forwarder::Forwarder;
use crate::http::response;
use crate::observability::metrics;

/// Reserved path of the diagnostic exchange.
pub const PING_PATH: &str = "/$$TEA/ping";

/// Host of a request as the broker sent it: the Host header, else the URI authority.
pub fn request_host<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or("")
}

/// Whether `request` is the diagnostic exchange.
pub fn is_ping<B>(request: &Request<B>) -> bool {
    request_host(request).is_empty() && request.uri().path() == PING_PATH
}

#[derive(Clone)]
pub struct RequestRouter {
    forwarder: Forwarder,
}

impl RequestRouter {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    pub async fn route<B>(&self, request: Request<B>) -> Response<Body>
    where
        B: hyper::body::Body<Data = axum::body::Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        if is_ping(&request) {
            tracing::trace!("Answering tunnel ping");
            metrics::record_exchange("ping", 200);
            return response::ping();
        }

        self.forwarder.forward(request.map(Body::new)).await
    }
}
