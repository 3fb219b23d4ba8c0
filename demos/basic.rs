//! Minimal portico demo: JSON echo, a deferred reply, a direct sink write and
//! static files.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/hello
//!   curl -X POST http://localhost:3000/echo \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/echo -H 'content-type: application/json' -d '{bad'
//!   curl -X OPTIONS -i http://localhost:3000/echo
//!   curl http://localhost:3000/raw
//!   curl http://localhost:3000/demos/basic.rs

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use portico::{
    Captures, Cors, Intent, Options, Payload, Reply, Request, Responder, ResponseSink, Router,
    Server,
};
use regex::Regex;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let routes = Router::new()
        .get("/hello", hello)
        .post("/echo", echo)
        .get("/slow", slow)
        .get("/raw", raw)
        .directory(Regex::new("^/demos/").unwrap(), ".");

    let options = Options::routes(routes)
        .cors(Cors::default().origin("*").headers("Content-Type"));

    Server::bind(([0, 0, 0, 0], 3000).into())
        .serve(options)
        .await
        .expect("server error");
}

// GET /hello
fn hello(_req: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply {
    r.html("<h1>hello</h1>")
}

// POST /echo
//
// The JSON body is parsed before the handler runs; a malformed body never
// gets here.
fn echo(req: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply {
    match req.body() {
        Some(body) => r.json(body),
        None => r.status_with(StatusCode::UNSUPPORTED_MEDIA_TYPE, "send application/json"),
    }
}

// GET /slow → resolves after the timer fires
fn slow(_req: Request, _: Captures, r: Responder, _: ResponseSink) -> Intent {
    Intent::deferred(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        r.text("done")
    })
}

// GET /raw → answered through the sink, no CORS headers added
fn raw(_req: Request, _: Captures, _: Responder, sink: ResponseSink) {
    let response = http::Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .header("content-length", "3")
        .body(Payload::Bytes(Bytes::from_static(b"raw")).into_body())
        .expect("static response parts are valid");
    let _ = sink.send(response);
}
