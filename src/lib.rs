//! # portico
//!
//! A small HTTP server toolkit. Requests go through one pipeline:
//!
//! - **Routing**: an ordered table of [`Route`]s, first match wins
//! - **Body parsing**: registered content types (JSON by default) are parsed
//!   before the handler runs; a malformed body is answered with `400`
//! - **Delegation**: a route serves a file, a directory tree, or calls a
//!   handler
//! - **Resolution**: whatever the handler returned becomes exactly one
//!   response with a correct `Content-Length` and the configured CORS headers
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use portico::{Captures, Cors, Intent, Options, Reply, Request, Responder, ResponseSink, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = Router::new()
//!         .get("/hello", hello)
//!         .post("/echo", echo)
//!         .file("/", "public/index.html");
//!
//!     let options = Options::routes(routes).cors(Cors::default().origin("*"));
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(options).await.unwrap();
//! }
//!
//! fn hello(_req: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply {
//!     r.text("hello")
//! }
//!
//! // `application/json` bodies arrive parsed.
//! fn echo(req: Request, _: Captures, r: Responder, _: ResponseSink) -> Intent {
//!     let body = req.body().cloned().unwrap_or_default();
//!     Intent::deferred(async move { r.json(&body) })
//! }
//! ```
//!
//! ## Handler return values
//!
//! A handler returns anything that implements [`IntoIntent`]: a [`Reply`], a
//! `bool` (`true` → `200`, `false` → `500`), an [`Intent::Deferred`] future,
//! or `()` after answering through its [`ResponseSink`].

mod body;
mod cors;
mod dispatch;
mod error;
mod handler;
mod intent;
mod mime;
mod request;
mod resolve;
mod response;
mod router;
mod server;
mod static_files;

pub use body::{BodyHandler, BodyKind, BodyRegistry, Filter};
pub use cors::Cors;
pub use dispatch::{Dispatcher, Options};
pub use error::{BodyError, BoxError, Error, ServeError};
pub use handler::{Captures, Handler};
pub use intent::{BoxFuture, Intent, IntoIntent, ResponseSink};
pub use request::{Request, RequestBody};
pub use response::{ContentType, Payload, Reply, Responder, ResponseBody};
pub use router::{Match, Matcher, PathMatcher, Route, Router, Target};
pub use server::Server;
pub use static_files::{FileServer, FileServers};
