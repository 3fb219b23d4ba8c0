//! Response triples and the [`Responder`] helpers handlers build them with.
//!
//! A [`Reply`] is the `(status, headers, body)` triple a handler hands back.
//! It is not yet a wire response: `Content-Length` and CORS headers are
//! filled in later by the resolver.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use tracing::error;

use crate::error::BoxError;

/// The body type of every response portico emits.
pub type ResponseBody = BoxBody<Bytes, BoxError>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types the [`Responder`] helpers produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,        // text/html
    Json,        // application/json
    OctetStream, // application/octet-stream
    Text,        // text/plain
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain",
        }
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// The body of a [`Reply`].
///
/// Text and byte payloads are written as a single chunk. A stream payload is
/// piped through as-is and must report an exact size hint unless the reply
/// carries its own `Content-Length`.
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    Stream(ResponseBody),
}

impl Payload {
    /// Wraps any body stream.
    pub fn stream<B>(body: B) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Stream(body.map_err(|e| -> BoxError { e.into() }).boxed())
    }

    /// Byte length of the payload, if it can be known before sending.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Self::Text(s) => Some(s.len() as u64),
            Self::Bytes(b) => Some(b.len() as u64),
            Self::Stream(body) => hyper::body::Body::size_hint(body).exact(),
        }
    }

    /// Converts into a response body, e.g. for [`ResponseSink::send`](crate::ResponseSink::send).
    pub fn into_body(self) -> ResponseBody {
        match self {
            Self::Text(s) => full(Bytes::from(s)),
            Self::Bytes(b) => full(b),
            Self::Stream(body) => body,
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self { Self::Text(s.to_owned()) }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(Bytes::from(b)) }
}

pub(crate) fn full(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// A `(status, headers, body)` triple.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Payload,
}

impl Reply {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Payload>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Adds a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    fn typed(status: StatusCode, content_type: ContentType, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        Self { status, headers, body: Payload::Text(body) }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ── Responder ─────────────────────────────────────────────────────────────────

/// Builds [`Reply`] values for the common cases.
///
/// Every helper has a plain form answering `200 OK` and a `_with` form taking
/// an explicit status.
///
/// ```rust
/// use portico::Responder;
/// use http::StatusCode;
///
/// let r = Responder;
/// r.text("hello");
/// r.json_with(StatusCode::CREATED, &serde_json::json!({ "id": 7 }));
/// r.status(StatusCode::NOT_FOUND);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Responder;

impl Responder {
    pub fn html(self, body: impl Into<String>) -> Reply {
        self.html_with(StatusCode::OK, body)
    }

    pub fn html_with(self, status: StatusCode, body: impl Into<String>) -> Reply {
        Reply::typed(status, ContentType::Html, body.into())
    }

    /// Serializes `value` as the JSON body.
    ///
    /// A value that fails to serialize yields a `500` page instead.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Reply {
        self.json_with(StatusCode::OK, value)
    }

    pub fn json_with<T: Serialize + ?Sized>(self, status: StatusCode, value: &T) -> Reply {
        match serde_json::to_string(value) {
            Ok(body) => Reply::typed(status, ContentType::Json, body),
            Err(e) => {
                error!("serializing json reply: {e}");
                self.status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn text(self, body: impl Into<String>) -> Reply {
        self.text_with(StatusCode::OK, body)
    }

    pub fn text_with(self, status: StatusCode, body: impl Into<String>) -> Reply {
        Reply::typed(status, ContentType::Text, body.into())
    }

    /// A minimal HTML page naming the status and its reason phrase.
    pub fn status(self, code: StatusCode) -> Reply {
        self.status_with(code, reason(code))
    }

    /// Like [`status`](Self::status) with a custom message.
    pub fn status_with(self, code: StatusCode, message: &str) -> Reply {
        Reply::typed(code, ContentType::Html, format!("<h1>{} {message}</h1>", code.as_u16()))
    }
}

/// Standard reason phrase for `code`.
pub(crate) fn reason(code: StatusCode) -> &'static str {
    code.canonical_reason().unwrap_or("Error")
}
