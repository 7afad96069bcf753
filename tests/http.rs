//! End-to-end HTTP/1.1 behavior over real TCP sockets.

mod harness;

use std::time::Duration;

use handoff::Config;
use harness::{INDEX_HTML, TestClient, TestServer};

#[tokio::test]
async fn test_post_echo_then_close() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client
        .send_raw(b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Type: text/plain\r\nContent-Length: 4\r\n\r\nping")
        .await
        .unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"ping");
    assert_eq!(resp.header("content-type"), Some("text/plain"));
    assert_eq!(resp.header("connection"), Some("close"));
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_root_serves_index() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    let resp = client.get("/").await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("text/html"));
    assert_eq!(resp.body, INDEX_HTML.as_bytes());

    server.shutdown().await;
}

#[tokio::test]
async fn test_keep_alive_reuses_connection() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    for _ in 0..3 {
        let resp = client.get("/a.txt").await.unwrap().unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"alpha");
    }
    assert_eq!(server.open_connections(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client
        .send_raw(
            b"GET /a.txt HTTP/1.1\r\nHost: test\r\n\r\n\
              GET /b.txt HTTP/1.1\r\nHost: test\r\n\r\n\
              GET /a.txt HTTP/1.1\r\nHost: test\r\n\r\n",
        )
        .await
        .unwrap();

    let bodies: Vec<Vec<u8>> = [
        client.read_response().await.unwrap().unwrap(),
        client.read_response().await.unwrap().unwrap(),
        client.read_response().await.unwrap().unwrap(),
    ]
    .into_iter()
    .map(|r| r.body)
    .collect();
    assert_eq!(bodies, vec![b"alpha".to_vec(), b"bravo".to_vec(), b"alpha".to_vec()]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    let raw = b"GET /b.txt HTTP/1.1\r\nHost: test\r\n\r\n";
    for piece in raw.chunks(3) {
        client.send_raw(piece).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"bravo");

    server.shutdown().await;
}

#[tokio::test]
async fn test_chunked_post_is_decoded() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client
        .send_raw(
            b"POST /echo HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\n\r\n\
              4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        )
        .await
        .unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"Wikipedia");
    assert_eq!(resp.header("content-length"), Some("9"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_header_gets_413_then_close() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    // Exactly the limit with no terminator, so the server reads every byte
    // before it answers and the close is not turned into a reset.
    let mut raw = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
    raw.resize(8192, b'a');
    client.send_raw(&raw).await.unwrap();

    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 413);
    assert_eq!(resp.header("connection"), Some("close"));
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_gets_413() {
    let (server, addr) = TestServer::spawn_with(Config::default().with_max_body_size(8)).await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client
        .send_raw(b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 64\r\n\r\n")
        .await
        .unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 413);
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client.send_raw(b"NONSENSE\r\n\r\n").await.unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 400);
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_version_gets_505() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client.send_raw(b"GET / HTTP/2.0\r\n\r\n").await.unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 505);

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_file_is_404_and_closes() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    let resp = client.get("/nope.txt").await.unwrap().unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.header("connection"), Some("close"));
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_path_traversal_stays_in_public_dir() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    let resp = client.get("/../a.txt").await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"alpha");

    server.shutdown().await;
}

#[tokio::test]
async fn test_http10_closes_after_response() {
    let (server, addr) = TestServer::spawn().await;
    let mut client = TestClient::connect(addr).await.unwrap();

    client.send_raw(b"GET /a.txt HTTP/1.0\r\n\r\n").await.unwrap();
    let resp = client.read_response().await.unwrap().unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"alpha");
    assert!(client.read_to_end().await.unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let (server, addr) =
        TestServer::spawn_with(Config::default().with_idle_timeout(Duration::from_millis(50))).await;
    let mut client = TestClient::connect(addr).await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(5), client.read_to_end())
        .await
        .expect("server should drop the idle connection");
    assert!(end.unwrap().is_empty());

    server.shutdown().await;
}
