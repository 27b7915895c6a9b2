//! HTTP/1.x framing on a tunnel connection.
//!
//! # Responsibilities
//! - Parse relayed requests off the connection, one at a time, with `httparse`
//! - Read each request body in full (Content-Length or chunked)
//! - Serialize replies with `Content-Length` and `Connection: keep-alive`
//!
//! # Design Decisions
//! - The relayed request's own connection semantics (`Connection: close`,
//!   HTTP/1.0) never decide whether the tunnel connection stays open
//! - Nothing is ever written in answer to a request that fails to parse;
//!   the caller ends the session instead
//! - Bytes read past one request stay buffered for the next (pipelining)

use std::io::Write as _;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Version};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response;

/// Maximum number of headers in one relayed request.
const MAX_HEADERS: usize = 100;

/// Upper bound on a request head (and on a single chunk-size line).
const MAX_HEAD_SIZE: usize = 64 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Errors reading or writing the tunnel wire.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("tunnel i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,

    #[error("malformed request head: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request head larger than {MAX_HEAD_SIZE} bytes")]
    HeadTooLarge,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("malformed chunked request body")]
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyFraming {
    None,
    Length(usize),
    Chunked,
}

/// A tunnel connection seen as a sequence of request/reply exchanges.
pub struct WireConnection<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> WireConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Read the next relayed request.
    ///
    /// `Ok(None)` means the broker closed the connection between requests.
    pub async fn read_request(&mut self) -> Result<Option<Request<Body>>, WireError> {
        let (head, head_len, framing) = loop {
            if let Some(parsed) = parse_head(&self.buf)? {
                break parsed;
            }
            if self.buf.len() > MAX_HEAD_SIZE {
                return Err(WireError::HeadTooLarge);
            }
            if self.fill().await? == 0 {
                // Stray line breaks between requests do not count as a request.
                return if self.buf.iter().all(|b| matches!(b, b'\r' | b'\n')) {
                    Ok(None)
                } else {
                    Err(WireError::UnexpectedEof)
                };
            }
        };
        self.buf.drain(..head_len);

        let body = match framing {
            BodyFraming::None => Vec::new(),
            BodyFraming::Length(len) => self.take(len).await?,
            BodyFraming::Chunked => self.read_chunked().await?,
        };

        let len = body.len();
        let mut request = head.map(|()| Body::from(body));
        if framing != BodyFraming::None {
            request
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        Ok(Some(request))
    }

    /// Write one reply and flush it.
    pub async fn write_response(&mut self, response: Response<Body>) -> Result<(), WireError> {
        let bytes = encode_response(response).await;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        self.buf.reserve(READ_CHUNK);
        self.stream.read_buf(&mut self.buf).await
    }

    /// Remove exactly `len` bytes from the front of the stream.
    async fn take(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        while self.buf.len() < len {
            if self.fill().await? == 0 {
                return Err(WireError::UnexpectedEof);
            }
        }
        Ok(self.buf.drain(..len).collect())
    }

    /// One CRLF-terminated line, without the CRLF.
    async fn read_line(&mut self) -> Result<Vec<u8>, WireError> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf[..pos].to_vec();
                self.buf.drain(..pos + 2);
                return Ok(line);
            }
            if self.buf.len() > MAX_HEAD_SIZE {
                return Err(WireError::HeadTooLarge);
            }
            if self.fill().await? == 0 {
                return Err(WireError::UnexpectedEof);
            }
        }
    }

    async fn read_chunked(&mut self) -> Result<Vec<u8>, WireError> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line().await?;
            let size = parse_chunk_size(&line).ok_or(WireError::Chunked)?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&self.take(size).await?);
            if !self.read_line().await?.is_empty() {
                return Err(WireError::Chunked);
            }
        }

        // Trailer section, discarded.
        while !self.read_line().await?.is_empty() {}
        Ok(body)
    }
}

/// Parse a complete request head from the front of `buf`.
///
/// Framing headers are consumed here: the body is re-framed with
/// `Content-Length` once it has been read.
fn parse_head(buf: &[u8]) -> Result<Option<(Request<()>, usize, BodyFraming)>, WireError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    let head_len = match parsed.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };
    let mut builder = Request::builder()
        .method(parsed.method.unwrap_or("GET"))
        .uri(parsed.path.unwrap_or("/"))
        .version(version);

    let mut chunked = false;
    let mut content_length = None;
    for h in parsed.headers.iter() {
        if h.name.eq_ignore_ascii_case("transfer-encoding") {
            chunked |= is_chunked(h.value);
        } else if h.name.eq_ignore_ascii_case("content-length") {
            let len = std::str::from_utf8(h.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| WireError::Invalid("bad Content-Length".into()))?;
            content_length = Some(len);
        } else {
            builder = builder.header(h.name, h.value);
        }
    }

    let framing = if chunked {
        BodyFraming::Chunked
    } else if let Some(len) = content_length {
        BodyFraming::Length(len)
    } else {
        BodyFraming::None
    };

    let request = builder.body(()).map_err(|e| WireError::Invalid(e.to_string()))?;
    Ok(Some((request, head_len, framing)))
}

fn is_chunked(value: &[u8]) -> bool {
    std::str::from_utf8(value)
        .map(|v| {
            v.rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
        })
        .unwrap_or(false)
}

/// Hex chunk size, ignoring chunk extensions.
fn parse_chunk_size(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let size = line.split(';').next()?.trim();
    usize::from_str_radix(size, 16).ok()
}

/// Serialize a reply: status line, headers, blank line, body.
///
/// A body that cannot be read is replaced by the 502 reply so the broker
/// still gets exactly one answer.
pub async fn encode_response(response: Response<Body>) -> Vec<u8> {
    let (parts, body) = response.into_parts();
    let (mut parts, body) = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => (parts, body),
        Err(e) => {
            tracing::error!(status = %parts.status, error = %e, "Failed to read reply body");
            let (parts, _) = response::bad_gateway().into_parts();
            (parts, Bytes::new())
        }
    };
    response::frame(&mut parts.headers, parts.status, &body);
    encode(parts.status, &parts.headers, &body)
}

fn encode(status: StatusCode, headers: &header::HeaderMap, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + body.len());
    // Writing into a Vec cannot fail.
    let _ = write!(
        out,
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}
