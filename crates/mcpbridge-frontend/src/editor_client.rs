//! The front end's JSON-RPC client half of the bridge protocol (spec §2:
//! "FE ... acts as a JSON-RPC client to the EB"). Speaks the exact same
//! `Content-Length`-framed wire as [`mcpbridge_runtime::BridgeServer`],
//! reusing `mcpbridge-core`'s framing codec, buffer pool, and reassembler
//! directly rather than a second implementation of the wire format.

use crate::error::{FrontendError, Result};
use mcpbridge_core::framing;
use mcpbridge_core::pool::BufferPool;
use mcpbridge_core::reassembler::Reassembler;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};

type PendingMap = Mutex<HashMap<u64, oneshot::Sender<Value>>>;

/// A connected session against the editor bridge. Dropping it does not
/// close the socket; call [`EditorClient::disconnect`] explicitly so the
/// reader task and the write half both tear down deterministically.
pub struct EditorClient {
    write: Mutex<tokio::net::tcp::OwnedWriteHalf>,
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    connected: Arc<AtomicBool>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl EditorClient {
    /// Connect to the editor bridge at `127.0.0.1:port` and spawn the
    /// reader task. Unsolicited notifications (anything without a
    /// matching pending request id) are pushed onto `notifications`.
    pub async fn connect(port: u16, notifications: mpsc::Sender<Value>) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        let (read_half, write_half) = stream.into_split();

        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let client = Arc::new(Self {
            write: Mutex::new(write_half),
            next_id: AtomicU64::new(1),
            pending: pending.clone(),
            connected: connected.clone(),
            reader_task: Mutex::new(None),
        });

        let handle = tokio::spawn(Self::read_loop(read_half, pending, connected, notifications));
        *client.reader_task.lock().await = Some(handle);

        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_loop(
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        pending: Arc<PendingMap>,
        connected: Arc<AtomicBool>,
        notifications: mpsc::Sender<Value>,
    ) {
        let pool = Arc::new(BufferPool::new());
        let mut reassembler = match Reassembler::new(pool) {
            Ok(r) => r,
            Err(_) => {
                connected.store(false, Ordering::SeqCst);
                return;
            }
        };

        loop {
            let mut scratch = vec![0u8; reassembler.read_capacity()];
            let n = match read_half.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };

            if reassembler.append(&scratch[..n]).is_err() {
                break;
            }
            let frames = match reassembler.extract() {
                Ok(frames) => frames,
                Err(_) => break,
            };

            for frame in frames {
                if frame.trim().is_empty() {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(&frame) else {
                    continue;
                };
                if let Some(id) = value.get("id").and_then(Value::as_u64) {
                    if let Some(tx) = pending.lock().await.remove(&id) {
                        let _ = tx.send(value);
                        continue;
                    }
                }
                let _ = notifications.send(value).await;
            }
        }

        connected.store(false, Ordering::SeqCst);
        let mut pending = pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Value::Null);
        }
    }

    /// Send a JSON-RPC request and await its response. Used for
    /// `get-tool-details` and MCP keepalive pings forwarded to the
    /// editor, if ever needed.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(FrontendError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let body = serde_json::to_string(&request)?;
        self.write_frame(&body).await?;

        match rx.await {
            Ok(Value::Null) => Err(FrontendError::ConnectionClosed),
            Ok(response) => {
                if let Some(error) = response.get("error") {
                    Err(FrontendError::RpcError(error.to_string()))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Err(_) => Err(FrontendError::ConnectionClosed),
        }
    }

    /// Fire a client-identity notification (spec §6: "a client-identity
    /// notification, by name agreed with the host, that sets a
    /// connection's display name exactly once per session").
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(FrontendError::NotConnected);
        }
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let body = serde_json::to_string(&notification)?;
        self.write_frame(&body).await
    }

    async fn write_frame(&self, body: &str) -> Result<()> {
        let framed = framing::encode(body);
        let mut write = self.write.lock().await;
        write.write_all(&framed).await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.write.lock().await.shutdown().await;
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
    }
}
