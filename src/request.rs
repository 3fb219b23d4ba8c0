//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{self, HeaderMap};
use http::request::Parts;
use http::{Method, Uri};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use serde_json::Value;

use crate::error::BoxError;

/// The unread request body stream.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// An incoming HTTP request.
///
/// Created once per request. The dispatcher attaches the parsed body after
/// the body gate; nothing else mutates it.
pub struct Request {
    head: Parts,
    raw: Option<RequestBody>,
    body: Option<Value>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn from_http<B>(req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (head, raw) = req.into_parts();
        let raw = raw.map_err(|e| -> BoxError { e.into() }).boxed_unsync();
        Self { head, raw: Some(raw), body: None, remote_addr }
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The path component of the URI, without the query string.
    pub fn path(&self) -> &str { self.head.uri.path() }

    pub fn query(&self) -> Option<&str> { self.head.uri.query() }

    /// Method, URI and headers without the body.
    pub fn head(&self) -> &Parts { &self.head }

    /// Header lookup. Values that are not visible ASCII are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// The parsed body.
    ///
    /// `None` unless the request's content type has a registered body handler.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Takes the raw body stream. Returns `None` once it has been consumed,
    /// including by the body parser.
    pub fn take_raw_body(&mut self) -> Option<RequestBody> {
        self.raw.take()
    }

    pub(crate) fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("body", &self.body)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}
