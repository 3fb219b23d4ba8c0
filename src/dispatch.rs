//! Per-request pipeline: route, short-circuit `OPTIONS`, parse the body,
//! delegate, resolve.
//!
//! ```text
//! ROUTING ──no match──────────────────────────────▶ 404
//!    │
//!    ├─ OPTIONS ──────────────────────────────────▶ 200, empty
//!    │
//! BODY GATE ──parse error─────────────────────────▶ 400
//!    │
//! DELEGATING ─┬─ File / Directory ─▶ file server ─▶ file, 404 or 500
//!             └─ Handler ─▶ Intent ─▶ RESOLVING ──▶ response
//! ```
//!
//! Every failure ends as an HTTP response. Nothing here returns an error to
//! the connection.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::request::Parts;
use http::{Method, StatusCode};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::body::{self, BodyHandler, BodyRegistry};
use crate::cors::Cors;
use crate::error::{BoxError, Error, ServeError};
use crate::handler::{BoxedHandler, Captures};
use crate::intent::{Intent, ResponseSink};
use crate::request::Request;
use crate::resolve::Resolver;
use crate::response::{ContentType, Reply, Responder, ResponseBody, full, reason};
use crate::router::{Match, Matcher, Router, Target};
use crate::static_files::FileServers;

// ── Options ───────────────────────────────────────────────────────────────────

/// Server configuration: CORS headers plus either a route table or a custom
/// [`Matcher`].
///
/// ```rust
/// use portico::{BodyHandler, Cors, Options, Router};
///
/// let options = Options::routes(Router::new())
///     .cors(Cors::default().origin("https://example.com"))
///     .body_handler("application/x-ndjson", BodyHandler::text(|raw| {
///         let lines: Result<Vec<serde_json::Value>, _> =
///             raw.lines().map(serde_json::from_str).collect();
///         Ok(serde_json::Value::Array(lines?))
///     }));
/// ```
pub struct Options {
    cors: Cors,
    matcher: Box<dyn Matcher>,
    bodies: BodyRegistry,
}

impl Options {
    /// Routes requests through a route table.
    pub fn routes(router: Router) -> Self {
        Self::route(router)
    }

    /// Routes requests through a custom matcher.
    pub fn route(matcher: impl Matcher) -> Self {
        Self {
            cors: Cors::default(),
            matcher: Box::new(matcher),
            bodies: BodyRegistry::default(),
        }
    }

    pub fn cors(mut self, cors: Cors) -> Self {
        self.cors = cors;
        self
    }

    /// Registers a body parser for an exact `Content-Type` value.
    pub fn body_handler(mut self, content_type: impl Into<String>, handler: BodyHandler) -> Self {
        self.bodies.register(content_type, handler);
        self
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Runs the request pipeline.
///
/// Owns the route table and the file server cache; share it across
/// connections behind an `Arc`.
pub struct Dispatcher {
    matcher: Box<dyn Matcher>,
    bodies: BodyRegistry,
    resolver: Resolver,
    files: FileServers,
}

impl Dispatcher {
    /// Fails if a CORS value is not a valid header value.
    pub fn new(options: Options) -> Result<Self, Error> {
        let cors = options.cors.compile()?;
        Ok(Self {
            matcher: options.matcher,
            bodies: options.bodies,
            resolver: Resolver::new(cors),
            files: FileServers::new(),
        })
    }

    /// Produces the response for one request.
    pub async fn dispatch<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<ResponseBody>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let req = Request::from_http(req, remote_addr);
        let span = info_span!("request", method = %req.method(), path = %req.path());
        async move {
            let started = Instant::now();
            let response = self.run(req).await;
            debug!(status = %response.status(), elapsed = ?started.elapsed(), "request finished");
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, mut req: Request) -> http::Response<ResponseBody> {
        let Some(Match { route, captures }) = self.matcher.matches(&req) else {
            debug!("no route matched");
            return self.resolver.emit(Responder.status(StatusCode::NOT_FOUND));
        };

        if *req.method() == Method::OPTIONS {
            return self.resolver.emit(preflight());
        }

        let body_handler = req.content_type().and_then(|ct| self.bodies.get(ct)).copied();
        if let Some(handler) = body_handler {
            if let Some(raw) = req.take_raw_body() {
                match body::read(&handler, raw).await {
                    Ok(parsed) => req.set_body(parsed),
                    Err(e) => {
                        let status = e.status();
                        if status.is_server_error() {
                            error!("reading request body: {e}");
                        } else {
                            warn!("rejecting request body: {e}");
                        }
                        return self.resolver.emit(Responder.status(status));
                    }
                }
            }
        }

        match route.target() {
            Target::File(file) => {
                let head = req.head();
                self.serve_file(file, head).await
            }
            Target::Directory(dir) => {
                let head = req.head();
                self.serve_directory(dir, head).await
            }
            Target::Handler(handler) => self.call(handler, req, captures).await,
        }
    }

    /// Invokes a handler and resolves what it returns.
    async fn call(
        &self,
        handler: &BoxedHandler,
        req: Request,
        captures: Captures,
    ) -> http::Response<ResponseBody> {
        let (sink, rx) = ResponseSink::channel();
        let intent = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.call(req, captures, Responder, sink)
        }))
        .unwrap_or_else(|_| {
            error!("handler panicked");
            Intent::Flag(false)
        });
        self.resolver.resolve(intent, rx).await
    }

    async fn serve_file(&self, file: &Path, head: &Parts) -> http::Response<ResponseBody> {
        let Some(name) = file.file_name() else {
            return static_error(&ServeError::not_found());
        };
        let dir = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let relative = Path::new(".").join(name);
        self.files
            .get(dir)
            .serve_file(relative, StatusCode::OK, HeaderMap::new(), head)
            .await
            .unwrap_or_else(|e| static_error(&e))
    }

    async fn serve_directory(&self, dir: &Path, head: &Parts) -> http::Response<ResponseBody> {
        self.files
            .get(dir)
            .serve(head)
            .await
            .unwrap_or_else(|e| static_error(&e))
    }
}

/// The answer to every matched `OPTIONS` request.
fn preflight() -> Reply {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ContentType::Text.as_str()));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    Reply::new(StatusCode::OK, headers, String::new())
}

/// Plain-text error page for a failed static file request. No CORS headers.
fn static_error(err: &ServeError) -> http::Response<ResponseBody> {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    if status.is_server_error() {
        error!("{err}");
    } else {
        debug!("{err}");
    }
    let text = reason(status);
    let mut response = http::Response::new(full(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ContentType::Text.as_str()));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http_body_util::{BodyExt, Full};
    use regex::Regex;
    use serde_json::json;

    use super::*;
    use crate::router::Route;

    fn request(method: &str, uri: &str, content_type: Option<&str>, body: &'static str) -> http::Request<Full<Bytes>> {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
    }

    fn get(uri: &str) -> http::Request<Full<Bytes>> {
        request("GET", uri, None, "")
    }

    async fn body_text(res: http::Response<ResponseBody>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn dispatcher(router: Router) -> Dispatcher {
        Dispatcher::new(Options::routes(router)).unwrap()
    }

    fn echo_x(req: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply {
        r.json(&req.body().map(|b| b["x"].clone()))
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let d = dispatcher(Router::new().get("/a", echo_x));
        let res = d.dispatch(get("/missing"), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_text(res).await.contains("404"));
    }

    #[tokio::test]
    async fn json_body_reaches_handler() {
        let d = dispatcher(Router::new().post("/json", echo_x));
        let res = d
            .dispatch(request("POST", "/json", Some("application/json"), r#"{"x":1}"#), None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(res.headers()["content-length"], "1");
        assert_eq!(body_text(res).await, "1");
    }

    #[tokio::test]
    async fn malformed_json_is_400_without_calling_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let d = dispatcher(Router::new().post("/json", move |_: Request, _: Captures, r: Responder, _: ResponseSink| {
            counter.fetch_add(1, Ordering::SeqCst);
            r.text("reached")
        }));
        let res = d
            .dispatch(request("POST", "/json", Some("application/json"), "{bad"), None)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_content_type_leaves_body_unparsed() {
        let d = dispatcher(Router::new().post("/raw", |mut req: Request, _: Captures, r: Responder, _: ResponseSink| {
            let parsed = req.body().is_some();
            let raw = req.take_raw_body();
            Intent::deferred(async move {
                let text = match raw {
                    Some(raw) => raw.collect().await.map(|c| c.to_bytes()).unwrap_or_default(),
                    None => Bytes::new(),
                };
                r.text(format!("{parsed}:{}", String::from_utf8_lossy(&text)))
            })
        }));
        let res = d.dispatch(request("POST", "/raw", Some("text/plain"), "abc"), None).await;
        assert_eq!(body_text(res).await, "false:abc");
    }

    #[tokio::test]
    async fn options_is_200_empty_regardless_of_method() {
        let d = Dispatcher::new(
            Options::routes(Router::new().post("/a", echo_x)).cors(Cors::default().origin("*")),
        )
        .unwrap();
        let res = d.dispatch(request("OPTIONS", "/a", Some("application/json"), "{bad"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-length"], "0");
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        assert_eq!(body_text(res).await, "");

        let res = d.dispatch(request("OPTIONS", "/b", None, ""), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_on_handler_and_error_responses() {
        let d = Dispatcher::new(
            Options::routes(Router::new().get("/a", echo_x))
                .cors(Cors::default().origin("https://x").headers("X-Foo")),
        )
        .unwrap();
        for uri in ["/a", "/missing"] {
            let res = d.dispatch(get(uri), None).await;
            assert_eq!(res.headers()["access-control-allow-origin"], "https://x");
            assert_eq!(res.headers()["access-control-allow-headers"], "X-Foo");
        }
    }

    #[tokio::test]
    async fn invalid_cors_is_rejected() {
        let options = Options::routes(Router::new()).cors(Cors::default().headers("a\r\nb"));
        assert!(matches!(Dispatcher::new(options), Err(Error::InvalidCors(_))));
    }

    #[tokio::test]
    async fn boolean_intents() {
        let d = dispatcher(
            Router::new()
                .get("/yes", |_: Request, _: Captures, _: Responder, _: ResponseSink| true)
                .get("/no", |_: Request, _: Captures, _: Responder, _: ResponseSink| false),
        );
        assert_eq!(d.dispatch(get("/yes"), None).await.status(), StatusCode::OK);
        assert_eq!(d.dispatch(get("/no"), None).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn handler_panic_is_500() {
        let d = dispatcher(Router::new().get("/boom", |_: Request, _: Captures, _: Responder, _: ResponseSink| -> Reply {
            panic!("boom")
        }));
        let res = d.dispatch(get("/boom"), None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn deferred_panic_is_500() {
        let d = dispatcher(Router::new().get("/boom", |_: Request, _: Captures, r: Responder, _: ResponseSink| {
            Intent::deferred(async move {
                if true {
                    panic!("deferred boom");
                }
                r.text("unreachable")
            })
        }));
        let res = d.dispatch(get("/boom"), None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// A request body whose stream fails before its end.
    struct Broken;

    impl hyper::body::Body for Broken {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, Self::Error>>> {
            std::task::Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer went away",
            ))))
        }
    }

    #[tokio::test]
    async fn failed_body_read_is_400_without_calling_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let d = dispatcher(Router::new().post("/json", move |_: Request, _: Captures, r: Responder, _: ResponseSink| {
            counter.fetch_add(1, Ordering::SeqCst);
            r.text("reached")
        }));
        let req = http::Request::builder()
            .method("POST")
            .uri("/json")
            .header("content-type", "application/json")
            .body(Broken)
            .unwrap();
        let res = d.dispatch(req, None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(res).await, "<h1>400 Bad Request</h1>");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn done_intent_uses_sink_response() {
        let d = dispatcher(Router::new().get("/direct", |_: Request, _: Captures, _: Responder, sink: ResponseSink| {
            tokio::spawn(async move {
                let res = http::Response::builder()
                    .status(StatusCode::ACCEPTED)
                    .body(full(Bytes::from_static(b"direct")))
                    .unwrap();
                let _ = sink.send(res);
            });
        }));
        let res = d.dispatch(get("/direct"), None).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(res).await, "direct");
    }

    #[tokio::test]
    async fn deferred_rejection_is_500() {
        let d = dispatcher(Router::new().get("/late", |_: Request, _: Captures, _: Responder, _: ResponseSink| {
            Intent::try_deferred(async { Err::<Reply, _>("database unavailable") })
        }));
        let res = d.dispatch(get("/late"), None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn custom_matcher_replaces_route_table() {
        let route = Arc::new(Route::handler(|_: Request, c: Captures, r: Responder, _: ResponseSink| {
            r.text(c.get("who").unwrap_or("nobody").to_owned())
        }));
        let d = Dispatcher::new(Options::route(move |req: &Request| -> Option<Match> {
            let who = req.path().strip_prefix("/hello/")?;
            let mut captures = Captures::new();
            captures.insert("who", who);
            Some(Match { route: Arc::clone(&route), captures })
        }))
        .unwrap();
        assert_eq!(body_text(d.dispatch(get("/hello/ana"), None).await).await, "ana");
        assert_eq!(d.dispatch(get("/bye"), None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn file_and_directory_routes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app.css"), "body{}").unwrap();

        let d = Dispatcher::new(
            Options::routes(
                Router::new()
                    .file("/", dir.path().join("index.html"))
                    .directory(Regex::new("^/assets/").unwrap(), dir.path()),
            )
            .cors(Cors::default().origin("*")),
        )
        .unwrap();

        let res = d.dispatch(get("/"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("access-control-allow-origin").is_none());
        assert_eq!(body_text(res).await, "<p>home</p>");

        let res = d.dispatch(get("/assets/app.css"), None).await;
        assert_eq!(res.headers()["content-type"], "text/css; charset=utf-8");
        assert_eq!(body_text(res).await, "body{}");

        let res = d.dispatch(get("/assets/missing.css"), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert_eq!(body_text(res).await, "Not Found");

        let res = d.dispatch(get("/assets/../../etc/passwd"), None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(res).await, "Internal Server Error");

        assert_eq!(d.files.len(), 1);
    }

    #[tokio::test]
    async fn registered_body_handler() {
        let d = Dispatcher::new(
            Options::routes(Router::new().post("/up", |req: Request, _: Captures, r: Responder, _: ResponseSink| {
                r.json(&req.body().cloned().unwrap_or_default())
            }))
            .body_handler("text/x-upper", BodyHandler::text(|raw| Ok(json!(raw.to_uppercase())))),
        )
        .unwrap();
        let res = d.dispatch(request("POST", "/up", Some("text/x-upper"), "abc"), None).await;
        assert_eq!(body_text(res).await, r#""ABC""#);
    }
}
