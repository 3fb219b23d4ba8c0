//! Error types.

use std::fmt;

use http::StatusCode;
use http::header::InvalidHeaderValue;

/// A boxed error as produced by handlers, deferred intents and body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by portico's fallible operations.
///
/// Application-level failures (404, 400, 500, etc.) are expressed as HTTP
/// responses, not as `Error`s. This type surfaces infrastructure and
/// configuration failures: binding to a port, accepting a connection, or a
/// CORS value that is not a valid header value.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    InvalidCors(InvalidHeaderValue),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidCors(e) => write!(f, "invalid cors header value: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidCors(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(e: InvalidHeaderValue) -> Self {
        Self::InvalidCors(e)
    }
}

// ── BodyError ─────────────────────────────────────────────────────────────────

/// Failure while reading or parsing a request body.
#[derive(Debug)]
pub enum BodyError {
    /// The request stream failed before reaching its end.
    Read(BoxError),
    /// The content-type filter rejected the body text.
    Parse(BoxError),
    /// The registered handler asks for a read mode that is not implemented.
    Unsupported(&'static str),
}

impl BodyError {
    /// The status the dispatcher answers with when this error occurs.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Read(_) | Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "reading body: {e}"),
            Self::Parse(e) => write!(f, "parsing body: {e}"),
            Self::Unsupported(mode) => write!(f, "body read mode `{mode}` is not supported"),
        }
    }
}

impl std::error::Error for BodyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) | Self::Parse(e) => Some(e.as_ref()),
            Self::Unsupported(_) => None,
        }
    }
}

// ── ServeError ────────────────────────────────────────────────────────────────

/// Failure reported by the static file server.
///
/// Carries the status the file server would have answered with. The
/// dispatcher only distinguishes `404` from everything else.
#[derive(Debug)]
pub struct ServeError {
    status: StatusCode,
    source: Option<std::io::Error>,
}

impl ServeError {
    pub(crate) fn not_found() -> Self {
        Self { status: StatusCode::NOT_FOUND, source: None }
    }

    pub(crate) fn forbidden() -> Self {
        Self { status: StatusCode::FORBIDDEN, source: None }
    }

    pub(crate) fn io(e: std::io::Error) -> Self {
        let status = match e.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, source: Some(e) }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(e) => write!(f, "static file error {}: {e}", self.status.as_u16()),
            None => write!(f, "static file error {}", self.status.as_u16()),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
