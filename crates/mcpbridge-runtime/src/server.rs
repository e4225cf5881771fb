//! Editor-side bridge server (spec §4.4): binds a loopback listener,
//! accepts clients, runs a read→reassemble→dispatch→respond loop per
//! connection, and broadcasts notifications to everyone currently
//! connected.

use crate::connection::ConnectionTable;
use crate::disconnect::is_normal_disconnect;
use crate::error::{Result, RuntimeError};
use crate::traits::{ConnectionSink, ErrorSink, RequestProcessor};
use mcpbridge_core::framing;
use mcpbridge_core::pool::BufferPool;
use mcpbridge_core::reassembler::Reassembler;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// The editor-side bridge server: one loopback `TcpListener`, a shared
/// connection table, and a shared buffer pool, all scoped to a single
/// `start`/`stop` lifetime. A fresh instance is created for each `start`;
/// the buffer pool is never shared across bridge instances (spec §5).
pub struct BridgeServer {
    processor: Arc<dyn RequestProcessor>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    connection_sink: Option<Arc<dyn ConnectionSink>>,
    connections: Arc<ConnectionTable>,
    pool: Arc<BufferPool>,
    cancel: CancellationToken,
    running: AtomicBool,
    bound_port: std::sync::Mutex<Option<u16>>,
    accept_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// How long `stop()` waits for per-connection tasks to end before
/// forcing resource release (spec §4.4, §5 `SHUTDOWN_TIMEOUT`).
const DEFAULT_SHUTDOWN_WAIT: Duration = mcpbridge_config::constants::DEFAULT_SHUTDOWN_TIMEOUT;

impl BridgeServer {
    pub fn new(
        processor: Arc<dyn RequestProcessor>,
        error_sink: Option<Arc<dyn ErrorSink>>,
        connection_sink: Option<Arc<dyn ConnectionSink>>,
    ) -> Self {
        Self {
            processor,
            error_sink,
            connection_sink,
            connections: Arc::new(ConnectionTable::new()),
            pool: Arc::new(BufferPool::new()),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
            bound_port: std::sync::Mutex::new(None),
            accept_task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn bound_port(&self) -> Option<u16> {
        *self.bound_port.lock().unwrap()
    }

    /// Bind `127.0.0.1:port` and spawn the accept loop. A port already in
    /// use surfaces as `RuntimeError::AddressInUse` so the caller (the
    /// lifecycle controller) can decide whether to wait-and-retry.
    pub async fn start(self: &Arc<Self>, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => RuntimeError::AddressInUse(port),
                _ => RuntimeError::Io(e),
            })?;
        let bound = listener.local_addr()?.port();
        *self.bound_port.lock().unwrap() = Some(bound);
        self.running.store(true, Ordering::SeqCst);

        let this = self.clone();
        let handle = tokio::spawn(async move { this.accept_loop(listener).await });
        *self.accept_task.lock().await = Some(handle);
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, endpoint)) => {
                            let this = self.clone();
                            tokio::spawn(async move { this.handle_connection(stream, endpoint).await });
                        }
                        Err(e) => {
                            if let Some(sink) = &self.error_sink {
                                sink.on_error("accept", &RuntimeError::Io(e));
                            }
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: tokio::net::TcpStream, endpoint: SocketAddr) {
        let (mut read_half, write_half) = stream.into_split();
        let conn = self.connections.insert(endpoint, write_half).await;

        let mut reassembler = match Reassembler::new(self.pool.clone()) {
            Ok(r) => r,
            Err(e) => {
                if let Some(sink) = &self.error_sink {
                    sink.on_error(
                        "reassembler-init",
                        &RuntimeError::ReassemblerInvariantViolated(endpoint, e.to_string()),
                    );
                }
                self.connections.remove_if_current(&endpoint, conn.generation);
                return;
            }
        };

        loop {
            let mut scratch = vec![0u8; reassembler.read_capacity()];
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = read_half.read(&mut scratch) => result,
            };

            let n = match read {
                Ok(0) => break, // peer closed
                Ok(n) => n,
                Err(e) => {
                    if !is_normal_disconnect(&e) {
                        if let Some(sink) = &self.error_sink {
                            sink.on_error("read", &RuntimeError::Io(e));
                        }
                    }
                    break;
                }
            };

            if let Err(e) = reassembler.append(&scratch[..n]) {
                if let Some(sink) = &self.error_sink {
                    sink.on_error(
                        "reassemble",
                        &RuntimeError::ReassemblerInvariantViolated(endpoint, e.to_string()),
                    );
                }
                break;
            }

            let frames = match reassembler.extract() {
                Ok(frames) => frames,
                Err(e) => {
                    if let Some(sink) = &self.error_sink {
                        sink.on_error(
                            "reassemble",
                            &RuntimeError::ReassemblerInvariantViolated(endpoint, e.to_string()),
                        );
                    }
                    break;
                }
            };

            for frame in frames {
                if frame.trim().is_empty() {
                    continue;
                }

                let response = self.processor.process(endpoint, &frame).await;
                let Some(response) = response else { continue };

                if self.cancel.is_cancelled() || !conn.is_writable().await {
                    continue;
                }

                let framed = framing::encode(&response);
                match conn.write_frame(&framed).await {
                    Ok(_) => {}
                    Err(e) if is_normal_disconnect(&e) => break,
                    Err(e) => {
                        if let Some(sink) = &self.error_sink {
                            sink.on_error("write", &RuntimeError::Io(e));
                        }
                        break;
                    }
                }
            }
        }

        self.connections.remove_if_current(&endpoint, conn.generation);
        if let Some(sink) = &self.connection_sink {
            sink.on_client_disconnected(endpoint);
        }
    }

    /// Frame `json_text` once and write it to every connection whose
    /// stream is still writable. Failures are best-effort: the connection
    /// is dropped from the table with a single `warn`-level log, never
    /// surfaced to the error sink.
    pub async fn broadcast(&self, json_text: &str) {
        let framed = framing::encode(json_text);
        for conn in self.connections.all() {
            match conn.write_frame(&framed).await {
                Ok(true) => {}
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(endpoint = %conn.endpoint, error = %e, "broadcast write failed, dropping connection");
                    self.connections.remove_if_current(&conn.endpoint, conn.generation);
                }
            }
        }
    }

    pub async fn update_client_name(&self, endpoint: SocketAddr, name: String) -> bool {
        self.connections.update_name(&endpoint, name).await
    }

    pub async fn connected_clients(&self) -> Vec<(SocketAddr, String)> {
        self.connections.connected_clients().await
    }

    /// Graceful shutdown: closes the listener (by cancelling the accept
    /// loop), closes every connection's write stream so remote peers see
    /// a clean EOF, waits up to `shutdown_timeout` for per-connection
    /// tasks, then proceeds regardless.
    pub async fn stop(&self) {
        self.stop_with_timeout(DEFAULT_SHUTDOWN_WAIT).await
    }

    pub async fn stop_with_timeout(&self, shutdown_timeout: Duration) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return; // stop() after stop() is a no-op
        }

        self.cancel.cancel();

        for conn in self.connections.all() {
            conn.close().await;
        }

        if let Some(handle) = self.accept_task.lock().await.take() {
            let _ = tokio::time::timeout(shutdown_timeout, handle).await;
        }

        *self.bound_port.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::test_support::{CountingConnectionSink, EchoProcessor, RecordingErrorSink};
    use mcpbridge_core::framing::{self as wire, HeaderParseResult};
    use std::sync::atomic::Ordering as AtomicOrdering;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpStream;

    async fn read_one_frame(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut scratch = [0u8; 4096];
        loop {
            let n = stream.read(&mut scratch).await.unwrap();
            buf.extend_from_slice(&scratch[..n]);
            if let Ok(HeaderParseResult::Complete { content_len, header_len }) =
                wire::try_parse_header(&buf, buf.len())
            {
                if wire::is_complete(buf.len(), content_len, header_len) {
                    return wire::extract_body(&buf, content_len, header_len).unwrap();
                }
            }
        }
    }

    #[tokio::test]
    async fn single_request_response_round_trip() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#;
        stream.write_all(&wire::encode(request)).await.unwrap();

        let response = read_one_frame(&mut stream).await;
        assert_eq!(response, r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#);

        server.stop().await;
    }

    #[tokio::test]
    async fn chunked_single_byte_delivery_still_yields_one_response() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = r#"{"jsonrpc":"2.0","id":7,"method":"ping","params":{}}"#;
        let frame = wire::encode(request);
        for byte in frame.iter() {
            stream.write_all(std::slice::from_ref(byte)).await.unwrap();
        }

        let response = read_one_frame(&mut stream).await;
        assert_eq!(response, r#"{"jsonrpc":"2.0","id":7,"result":"pong"}"#);

        server.stop().await;
    }

    #[tokio::test]
    async fn pipelined_requests_respond_in_order() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut bytes = Vec::new();
        for i in 1..=3 {
            bytes.extend(wire::encode(&format!(
                r#"{{"jsonrpc":"2.0","id":{i},"method":"ping","params":{{}}}}"#
            )));
        }
        stream.write_all(&bytes).await.unwrap();

        for i in 1..=3 {
            let response = read_one_frame(&mut stream).await;
            assert_eq!(
                response,
                format!(r#"{{"jsonrpc":"2.0","id":{i},"result":"pong"}}"#)
            );
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn zero_byte_read_ends_connection_without_error() {
        let error_sink = Arc::new(RecordingErrorSink::default());
        let connection_sink = Arc::new(CountingConnectionSink::default());
        let server = Arc::new(BridgeServer::new(
            Arc::new(EchoProcessor),
            Some(error_sink.clone()),
            Some(connection_sink.clone()),
        ));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connection_sink.disconnects.load(AtomicOrdering::SeqCst), 1);
        assert!(error_sink.errors.lock().unwrap().is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn stop_then_stop_is_a_no_op() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        server.stop().await;
        server.stop().await; // must not panic or hang
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn connected_clients_are_name_ordered() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let _s1 = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let _s2 = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let clients = server.connected_clients().await;
        assert_eq!(clients.len(), 2);
        assert!(clients.windows(2).all(|w| w[0].1 <= w[1].1));

        server.stop().await;
    }

    #[tokio::test]
    async fn oversize_body_closes_only_the_offending_connection() {
        let server = Arc::new(BridgeServer::new(Arc::new(EchoProcessor), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let mut bad = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let oversize = mcpbridge_config::constants::MAX_MESSAGE + 1;
        let header = format!("Content-Length: {oversize}\r\n\r\n");
        bad.write_all(header.as_bytes()).await.unwrap();

        let mut good = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        good.write_all(&wire::encode(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#,
        ))
        .await
        .unwrap();
        let response = read_one_frame(&mut good).await;
        assert_eq!(response, r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#);

        server.stop().await;
    }
}
