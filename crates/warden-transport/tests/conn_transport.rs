//! ConnTransport behaviour against scripted loopback HTTP servers.
#![allow(clippy::tests_outside_test_module)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use http::header::{HeaderName, HeaderValue};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use warden_transport::body::collect_body;
use warden_transport::{ConnTransport, Fetch, FetchError, FetchRequest, TcpConnector};

use common::{HttpServer, Step};

async fn transport(server: &HttpServer) -> ConnTransport<TcpStream> {
    let connector = Arc::new(TcpConnector::new());
    let addr = server.addr.to_string();
    let stream = connector.dial(&addr).await.unwrap();
    ConnTransport::new(stream)
        .await
        .unwrap()
        .with_redial(connector.redialer(addr))
}

async fn body_text(response: warden_transport::FetchResponse) -> String {
    let bytes = collect_body(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn keep_alive_reuses_connection() {
    let server = HttpServer::start(vec![vec![Step::Reply("a"), Step::Reply("b")]]).await;
    let t = transport(&server).await;

    for expected in ["a", "b"] {
        let req = FetchRequest::parse(Method::GET, &server.url("/x")).unwrap();
        let resp = t.fetch(&req).await.unwrap();
        assert_eq!(body_text(resp).await, expected);
    }
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn eof_on_replayable_request_redials_once() {
    let server = HttpServer::start(vec![vec![Step::Drop], vec![Step::Reply("retried")]]).await;
    let t = transport(&server).await;

    let req = FetchRequest::parse(Method::GET, &server.url("/page")).unwrap();
    let resp = t.fetch(&req).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(body_text(resp).await, "retried");
    assert_eq!(server.connections(), 2);
    assert_eq!(server.requests(), 2);
}

#[tokio::test]
async fn post_is_not_replayed() {
    let server = HttpServer::start(vec![vec![Step::Drop], vec![Step::Reply("never")]]).await;
    let t = transport(&server).await;

    let req = FetchRequest::parse(Method::POST, &server.url("/submit"))
        .unwrap()
        .with_body("form=1");
    let err = t.fetch(&req).await.unwrap_err();
    assert!(err.is_redial_worthy(), "{err}");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn idempotency_key_allows_replay() {
    let server = HttpServer::start(vec![vec![Step::Drop], vec![Step::Reply("stored")]]).await;
    let t = transport(&server).await;

    let req = FetchRequest::parse(Method::POST, &server.url("/submit"))
        .unwrap()
        .with_body("form=1")
        .with_header(
            HeaderName::from_static("idempotency-key"),
            HeaderValue::from_static("abc"),
        );
    let resp = t.fetch(&req).await.unwrap();
    assert_eq!(body_text(resp).await, "stored");
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn used_connection_is_replaced_before_non_replayable_request() {
    let server =
        HttpServer::start(vec![vec![Step::Reply("first")], vec![Step::Reply("second")]]).await;
    let t = transport(&server).await;

    let get = FetchRequest::parse(Method::GET, &server.url("/")).unwrap();
    assert_eq!(body_text(t.fetch(&get).await.unwrap()).await, "first");

    let post = FetchRequest::parse(Method::POST, &server.url("/")).unwrap().with_body("x");
    assert_eq!(body_text(t.fetch(&post).await.unwrap()).await, "second");
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn failed_proactive_redial_uses_existing_connection() {
    let server = HttpServer::start(vec![vec![Step::Reply("a"), Step::Reply("b")]]).await;
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let t = ConnTransport::new(stream)
        .await
        .unwrap()
        .with_redial(|| async { Err::<TcpStream, _>(FetchError::Timeout("connect")) });

    let get = FetchRequest::parse(Method::GET, &server.url("/")).unwrap();
    assert_eq!(body_text(t.fetch(&get).await.unwrap()).await, "a");

    let post = FetchRequest::parse(Method::POST, &server.url("/")).unwrap().with_body("x");
    assert_eq!(body_text(t.fetch(&post).await.unwrap()).await, "b");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn failed_reactive_redial_returns_exchange_error() {
    let server = HttpServer::start(vec![vec![Step::Drop]]).await;
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let t = ConnTransport::new(stream)
        .await
        .unwrap()
        .with_redial(|| async { Err::<TcpStream, _>(FetchError::Timeout("connect")) });

    let req = FetchRequest::parse(Method::GET, &server.url("/")).unwrap();
    let err = t.fetch(&req).await.unwrap_err();
    assert!(matches!(err, FetchError::Http(_)), "{err}");
}

#[tokio::test]
async fn cancel_during_reactive_redial_returns_canceled() {
    let server = HttpServer::start(vec![vec![Step::Drop]]).await;
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let t = ConnTransport::new(stream).await.unwrap().with_redial(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err::<TcpStream, _>(FetchError::Timeout("connect"))
    });

    let token = CancellationToken::new();
    let req = FetchRequest::parse(Method::GET, &server.url("/"))
        .unwrap()
        .with_cancel(token.clone());
    let canceler = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), t.fetch(&req))
        .await
        .expect("cancel should end the redial")
        .unwrap_err();
    assert!(matches!(err, FetchError::Canceled), "{err}");
    canceler.await.unwrap();
}

#[tokio::test]
async fn without_redial_errors_propagate() {
    let server = HttpServer::start(vec![vec![Step::Drop]]).await;
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let t = ConnTransport::new(stream).await.unwrap();

    let req = FetchRequest::parse(Method::GET, &server.url("/")).unwrap();
    assert!(t.fetch(&req).await.unwrap_err().is_redial_worthy());
}

#[tokio::test]
async fn lazy_transport_dials_on_first_use() {
    let server = HttpServer::start(vec![vec![Step::Reply("lazy")]]).await;
    let connector = Arc::new(TcpConnector::new());
    let t = ConnTransport::lazy(connector.redialer(server.addr.to_string()));
    assert_eq!(server.connections(), 0);

    let req = FetchRequest::parse(Method::GET, &server.url("/")).unwrap();
    assert_eq!(body_text(t.fetch(&req).await.unwrap()).await, "lazy");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn canceled_request_is_not_written() {
    let server = HttpServer::start(vec![vec![Step::Reply("unused")]]).await;
    let t = transport(&server).await;

    let token = CancellationToken::new();
    token.cancel();
    let req = FetchRequest::parse(Method::GET, &server.url("/"))
        .unwrap()
        .with_cancel(token);
    assert!(matches!(t.fetch(&req).await, Err(FetchError::Canceled)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.requests(), 0);
}

#[tokio::test]
async fn cancel_aborts_blocked_body_read() {
    let server = HttpServer::start(vec![vec![Step::Stall]]).await;
    let t = transport(&server).await;

    let token = CancellationToken::new();
    let req = FetchRequest::parse(Method::GET, &server.url("/slow"))
        .unwrap()
        .with_cancel(token.clone());
    let resp = t.fetch(&req).await.unwrap();

    let reader = tokio::spawn(collect_body(resp.into_body()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("body read did not observe cancellation")
        .unwrap();
    assert!(matches!(result, Err(FetchError::Canceled)));
}
