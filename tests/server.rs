use std::net::SocketAddr;

use portico::{Captures, Cors, Options, Reply, Request, Responder, ResponseSink, Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn echo_x(req: Request, _: Captures, r: Responder, _: ResponseSink) -> Reply {
    r.json(&req.body().map(|b| b["x"].clone()))
}

async fn start() -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let options = Options::routes(Router::new().post("/json", echo_x))
        .cors(Cors::default().origin("*"));

    let handle = tokio::spawn(async move {
        Server::from_listener(listener)
            .serve_with_shutdown(options, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx, handle)
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_requests_over_tcp() {
    let (addr, shutdown, handle) = start().await;

    let res = roundtrip(
        addr,
        "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "{res}");
    assert!(res.to_ascii_lowercase().contains("access-control-allow-origin: *"), "{res}");

    let body = r#"{"x":1}"#;
    let res = roundtrip(
        addr,
        &format!(
            "POST /json HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.to_ascii_lowercase().contains("content-length: 1\r\n"), "{res}");
    assert!(res.ends_with("\r\n\r\n1"), "{res}");

    let res = roundtrip(
        addr,
        "POST /json HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
         Content-Length: 4\r\nConnection: close\r\n\r\n{bad",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{res}");

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
