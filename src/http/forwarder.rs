//! Delivery of relayed requests to the local backend.
//!
//! # Responsibilities
//! - Rewrite the relayed request into an absolute-form client request
//! - Resolve the Host header sent to the backend
//! - Emit the access log
//! - Execute the request and turn the outcome into exactly one response
//!
//! # Design Decisions
//! - One pooled client shared by every session; it needs no extra locking
//! - http and https backends share the client; https goes through rustls with
//!   the webpki root store
//! - Backend failures become a 502 so the tunnel connection stays usable

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::config::BackendConfig;
use crate::http::response;
use crate::observability::logging::ACCESS_TARGET;
use crate::observability::metrics;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Where relayed requests are delivered.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    scheme: Scheme,
    authority: Authority,
    host_override: Option<String>,
}

impl BackendTarget {
    /// `scheme` defaults to http when absent.
    pub fn new(host: &str, scheme: Option<&str>, host_override: Option<&str>) -> Result<Self, String> {
        let scheme: Scheme = scheme
            .unwrap_or("http")
            .parse()
            .map_err(|e| format!("bad scheme: {e}"))?;
        let authority: Authority = host.parse().map_err(|e| format!("bad host: {e}"))?;

        Ok(Self {
            scheme,
            authority,
            host_override: host_override.map(str::to_string),
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn host_override(&self) -> Option<&str> {
        self.host_override.as_deref()
    }

    /// Point a relayed request-target at the backend, keeping path and query.
    pub fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, axum::http::uri::InvalidUriParts> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts)
    }
}

/// Host header for the backend request.
///
/// Precedence: configured override, then the relayed `X-Forwarded-Host`,
/// then the backend's own host.
pub fn resolve_host<'a>(host_override: Option<&'a str>, headers: &'a HeaderMap, local_host: &'a str) -> &'a str {
    if let Some(host) = host_override.filter(|h| !h.is_empty()) {
        return host;
    }

    headers
        .get(X_FORWARDED_HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or(local_host)
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

static CRYPTO_PROVIDER_INIT: Once = Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::debug!("Rustls crypto provider already installed");
        }
    });
}

/// TCP connector for the backend, upgraded to TLS for https targets.
fn backend_connector(config: &BackendConfig) -> HttpsConnector<HttpConnector> {
    ensure_crypto_provider();

    let mut http = HttpConnector::new();
    http.set_nodelay(true);
    http.enforce_http(false);
    if config.connect_timeout_secs > 0 {
        http.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    }

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http)
}

/// Forwards relayed requests to the local backend.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    target: Arc<BackendTarget>,
}

impl Forwarder {
    pub fn new(target: BackendTarget, config: &BackendConfig) -> Self {
        let connector = backend_connector(config);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            client,
            target: Arc::new(target),
        }
    }

    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    /// Execute one relayed request. Always produces a response.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();

        parts.uri = match self.target.rewrite_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(uri = %parts.uri, error = %e, "Cannot rewrite request target");
                metrics::record_exchange("forward", 502);
                return response::bad_gateway();
            }
        };

        tracing::info!(
            target: ACCESS_TARGET,
            forwarded_for = %header_str(&parts.headers, X_FORWARDED_FOR),
            method = %parts.method,
            url = %parts.uri,
            user_agent = %header_str(&parts.headers, header::USER_AGENT),
            "request"
        );

        let host = resolve_host(
            self.target.host_override(),
            &parts.headers,
            self.target.authority().as_str(),
        )
        .to_string();
        match HeaderValue::from_str(&host) {
            Ok(value) => {
                parts.headers.insert(header::HOST, value);
            }
            Err(_) => {
                tracing::warn!(host = %host, "Invalid Host value, using backend host");
                parts.headers.remove(header::HOST);
            }
        }

        // The tunnel's framing is not the backend connection's.
        parts.headers.remove(header::CONNECTION);
        parts.version = Version::HTTP_11;

        let url = parts.uri.clone();
        let start = Instant::now();
        let result = self.client.request(Request::from_parts(parts, body)).await;
        metrics::record_backend_latency(start);

        match result {
            Ok(backend_response) => {
                let response = response::relay(backend_response).await;
                metrics::record_exchange("forward", response.status().as_u16());
                response
            }
            Err(e) => {
                tracing::error!(url = %url, error = ?e, "Backend request failed");
                metrics::record_exchange("forward", 502);
                response::bad_gateway()
            }
        }
    }
}
