//! Turns an [`Intent`] into the one response a request gets.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::header::{CONTENT_LENGTH, HeaderValue};
use http::StatusCode;
use tracing::{debug, error, warn};

use crate::cors::CorsHeaders;
use crate::intent::{Intent, SinkReceiver};
use crate::response::{Reply, Responder, ResponseBody};

pub(crate) struct Resolver {
    cors: CorsHeaders,
}

impl Resolver {
    pub(crate) fn new(cors: CorsHeaders) -> Self {
        Self { cors }
    }

    /// Settles `intent` into a response.
    ///
    /// `sink` is the receiving end of the handler's [`ResponseSink`](crate::ResponseSink).
    /// It is only awaited for [`Intent::Done`]. No timeout is applied to
    /// deferred intents or to the sink. A deferred intent that panics
    /// settles to a `500` page.
    pub(crate) async fn resolve(
        &self,
        mut intent: Intent,
        mut sink: SinkReceiver,
    ) -> http::Response<ResponseBody> {
        loop {
            intent = match intent {
                Intent::Done => return self.await_sink(sink).await,
                Intent::Flag(true) => Intent::Reply(Responder.status(StatusCode::OK)),
                Intent::Flag(false) => {
                    Intent::Reply(Responder.status(StatusCode::INTERNAL_SERVER_ERROR))
                }
                Intent::Deferred(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(next)) => next,
                    Ok(Err(e)) => {
                        error!("deferred response failed: {e}");
                        Intent::Reply(Responder.status(StatusCode::INTERNAL_SERVER_ERROR))
                    }
                    Err(_) => {
                        error!("deferred response panicked");
                        Intent::Reply(Responder.status(StatusCode::INTERNAL_SERVER_ERROR))
                    }
                },
                Intent::Reply(reply) => {
                    if let Ok(sent) = sink.try_recv() {
                        warn!(
                            dropped = %reply.status,
                            "handler answered through its sink and also returned a reply"
                        );
                        return sent;
                    }
                    return self.emit(reply);
                }
            };
        }
    }

    async fn await_sink(&self, sink: SinkReceiver) -> http::Response<ResponseBody> {
        match sink.await {
            Ok(sent) => {
                debug!(status = %sent.status(), "handler answered through its sink");
                sent
            }
            Err(_) => {
                error!("handler returned no response and dropped its sink");
                self.emit(Responder.status(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }

    /// Fills in `Content-Length`, merges CORS headers and builds the response.
    ///
    /// A body whose length cannot be known up front is replaced by a `500`
    /// page: responses are never sent chunked.
    pub(crate) fn emit(&self, reply: Reply) -> http::Response<ResponseBody> {
        let Reply { status, mut headers, body } = reply;
        if !headers.contains_key(CONTENT_LENGTH) {
            let Some(len) = body.content_length() else {
                error!(%status, "response body has no known length");
                return self.emit(Responder.status(StatusCode::INTERNAL_SERVER_ERROR));
            };
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
        self.cors.apply(&mut headers);

        let mut response = http::Response::new(body.into_body());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
