//! Response intents: what a handler returns before it becomes a response.
//!
//! A handler answers with exactly one of four things:
//!
//! | Variant | Meaning |
//! |---|---|
//! | [`Intent::Reply`] | a `(status, headers, body)` triple |
//! | [`Intent::Flag`] | `true` for a `200` page, `false` for a `500` page |
//! | [`Intent::Deferred`] | a future settling to another intent, or to an error (`500`) |
//! | [`Intent::Done`] | the handler answered through its [`ResponseSink`] |
//!
//! Returning a reply *and* writing to the sink is a contract violation. The
//! sink write wins and the reply is dropped with a warning.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;
use tracing::error;

use crate::error::BoxError;
use crate::response::{Reply, ResponseBody};

/// A heap-allocated, type-erased future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The value a handler returns.
pub enum Intent {
    Done,
    Flag(bool),
    Deferred(BoxFuture<Result<Intent, BoxError>>),
    Reply(Reply),
}

impl Intent {
    /// Defers to the output of `fut`.
    ///
    /// ```rust,no_run
    /// use portico::{Captures, Intent, Request, Responder, ResponseSink};
    ///
    /// fn slow(_req: Request, _: Captures, r: Responder, _: ResponseSink) -> Intent {
    ///     Intent::deferred(async move {
    ///         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    ///         r.text("done")
    ///     })
    /// }
    /// ```
    pub fn deferred<F, T>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: IntoIntent,
    {
        Self::Deferred(Box::pin(async move { Ok::<_, BoxError>(fut.await.into_intent()) }))
    }

    /// Defers to a fallible future. An `Err` resolves to a `500` page.
    pub fn try_deferred<F, T, E>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: IntoIntent,
        E: Into<BoxError>,
    {
        Self::Deferred(Box::pin(async move {
            fut.await
                .map(IntoIntent::into_intent)
                .map_err(|e| -> BoxError { e.into() })
        }))
    }
}

impl fmt::Debug for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Flag(b) => f.debug_tuple("Flag").field(b).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Reply(r) => f.debug_tuple("Reply").field(r).finish(),
        }
    }
}

// ── IntoIntent ────────────────────────────────────────────────────────────────

/// Conversion into an [`Intent`].
///
/// Lets handlers return a [`Reply`], a `bool`, `()` (meaning the sink was
/// used) or a `Result` of any of these.
pub trait IntoIntent {
    fn into_intent(self) -> Intent;
}

impl IntoIntent for Intent {
    fn into_intent(self) -> Intent { self }
}

impl IntoIntent for Reply {
    fn into_intent(self) -> Intent { Intent::Reply(self) }
}

impl IntoIntent for bool {
    fn into_intent(self) -> Intent { Intent::Flag(self) }
}

impl IntoIntent for () {
    fn into_intent(self) -> Intent { Intent::Done }
}

/// `Err` is logged and answered with a `500` page.
impl<T, E> IntoIntent for Result<T, E>
where
    T: IntoIntent,
    E: fmt::Display,
{
    fn into_intent(self) -> Intent {
        match self {
            Ok(v) => v.into_intent(),
            Err(e) => {
                error!("handler failed: {e}");
                Intent::Flag(false)
            }
        }
    }
}

// ── ResponseSink ──────────────────────────────────────────────────────────────

/// Direct access to the response of the current request.
///
/// A handler that answers through the sink returns [`Intent::Done`] (or `()`).
/// The response is sent as given: no `Content-Length` computation, no CORS
/// headers. Sending consumes the sink, so a request can be answered through
/// it at most once.
pub struct ResponseSink {
    tx: oneshot::Sender<http::Response<ResponseBody>>,
}

pub(crate) type SinkReceiver = oneshot::Receiver<http::Response<ResponseBody>>;

impl ResponseSink {
    pub(crate) fn channel() -> (Self, SinkReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends `response`. Gives it back if the connection is already gone.
    pub fn send(
        self,
        response: http::Response<ResponseBody>,
    ) -> Result<(), http::Response<ResponseBody>> {
        self.tx.send(response)
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSink").finish_non_exhaustive()
    }
}
