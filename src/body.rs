//! Request body parsing.
//!
//! Bodies are only parsed when the request's `Content-Type` exactly matches a
//! registered [`BodyHandler`]. The whole body is buffered in memory before the
//! handler's filter runs.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;

use crate::error::{BodyError, BoxError};

/// How the raw bytes are accumulated before filtering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyKind {
    /// UTF-8 text collected to end of stream.
    Text,
    /// Raw bytes. Not implemented; reading fails with [`BodyError::Unsupported`].
    Buffer,
}

/// Turns the accumulated body text into a parsed value.
pub type Filter = fn(&str) -> Result<Value, BoxError>;

/// A registered content-type parser.
#[derive(Clone, Copy, Debug)]
pub struct BodyHandler {
    pub kind: BodyKind,
    pub filter: Filter,
}

impl BodyHandler {
    pub fn text(filter: Filter) -> Self {
        Self { kind: BodyKind::Text, filter }
    }

    /// `application/json` via serde_json.
    pub fn json() -> Self {
        Self::text(|raw| serde_json::from_str(raw).map_err(Into::into))
    }
}

/// Content type → parser.
#[derive(Clone, Debug)]
pub struct BodyRegistry {
    handlers: HashMap<String, BodyHandler>,
}

impl BodyRegistry {
    /// A registry with no parsers at all.
    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, content_type: impl Into<String>, handler: BodyHandler) {
        self.handlers.insert(content_type.into(), handler);
    }

    /// Exact, case-sensitive lookup. `application/json; charset=utf-8` does not
    /// match `application/json`.
    pub fn get(&self, content_type: &str) -> Option<&BodyHandler> {
        self.handlers.get(content_type)
    }
}

impl Default for BodyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("application/json", BodyHandler::json());
        registry
    }
}

/// Reads `body` to its end and runs `handler`'s filter over it.
pub async fn read<B>(handler: &BodyHandler, body: B) -> Result<Value, BodyError>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if handler.kind == BodyKind::Buffer {
        return Err(BodyError::Unsupported("buffer"));
    }
    let bytes = body
        .collect()
        .await
        .map_err(|e| BodyError::Read(e.into()))?
        .to_bytes();
    let text = String::from_utf8_lossy(&bytes);
    (handler.filter)(&text).map_err(BodyError::Parse)
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;

    use super::*;

    /// Fails on the first poll.
    struct Broken;

    impl hyper::body::Body for Broken {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
            Poll::Ready(Some(Err(std::io::Error::other("connection reset"))))
        }
    }

    fn body(s: &'static str) -> Full<Bytes> {
        Full::new(Bytes::from_static(s.as_bytes()))
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let value = read(&BodyHandler::json(), body(r#"{"x":1}"#)).await.unwrap();
        assert_eq!(value["x"], 1);
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let err = read(&BodyHandler::json(), body("{bad")).await.unwrap_err();
        assert!(matches!(err, BodyError::Parse(_)));
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stream_failure_is_a_read_error() {
        let err = read(&BodyHandler::json(), Broken).await.unwrap_err();
        assert!(matches!(err, BodyError::Read(_)));
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failure_after_some_chunks_is_a_read_error() {
        let chunks: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"{\"x\":"))),
            Err(std::io::Error::other("truncated")),
        ];
        let body = StreamBody::new(futures::stream::iter(chunks));
        let err = read(&BodyHandler::json(), body).await.unwrap_err();
        assert!(matches!(err, BodyError::Read(_)));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_before_filtering() {
        let handler = BodyHandler::text(|raw| Ok(Value::String(raw.to_owned())));
        let body = Full::new(Bytes::from_static(b"caf\xff!"));
        let value = read(&handler, body).await.unwrap();
        assert_eq!(value, Value::String("caf\u{FFFD}!".into()));
    }

    #[tokio::test]
    async fn buffer_mode_fails_fast() {
        let handler = BodyHandler { kind: BodyKind::Buffer, filter: |_| Ok(Value::Null) };
        let err = read(&handler, body("anything")).await.unwrap_err();
        assert!(matches!(err, BodyError::Unsupported("buffer")));
        assert_eq!(err.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn custom_text_filter() {
        let handler = BodyHandler::text(|raw| Ok(Value::String(raw.to_uppercase())));
        let value = read(&handler, body("shout")).await.unwrap();
        assert_eq!(value, Value::String("SHOUT".into()));
    }

    #[test]
    fn registry_matches_content_type_exactly() {
        let registry = BodyRegistry::default();
        assert!(registry.get("application/json").is_some());
        assert!(registry.get("application/json; charset=utf-8").is_none());
        assert!(registry.get("text/plain").is_none());
        assert!(BodyRegistry::empty().get("application/json").is_none());
    }
}
