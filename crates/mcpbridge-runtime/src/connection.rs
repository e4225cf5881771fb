//! The live-connection table the bridge server's accept loop and
//! per-connection handlers share (spec §3 "Connection", §5 concurrency
//! model: "a concurrent associative container safe for lock-free reads
//! and compare-and-swap replacement").

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// One live TCP peer. `generation` is stamped by the accept path and used
/// to detect whether this entry has since been replaced by a reconnect
/// from the same endpoint, so a stale handler's exit-time removal can
/// never clobber a newer connection (spec §4.4, §5).
pub struct Connection {
    pub endpoint: SocketAddr,
    pub name: Mutex<String>,
    pub connected_at: Instant,
    pub generation: u64,
    write_half: Mutex<Option<OwnedWriteHalf>>,
}

/// Display name a connection carries before it identifies itself.
pub const UNKNOWN_NAME: &str = "unknown";

impl Connection {
    pub fn new(endpoint: SocketAddr, generation: u64, write_half: OwnedWriteHalf) -> Self {
        Self {
            endpoint,
            name: Mutex::new(UNKNOWN_NAME.to_string()),
            connected_at: Instant::now(),
            generation,
            write_half: Mutex::new(Some(write_half)),
        }
    }

    /// Write a fully framed message. Returns `Ok(false)` if the stream was
    /// already closed (e.g. concurrently closed by `close`), which callers
    /// must treat the same as a normal disconnect, never as an error.
    pub async fn write_frame(&self, frame: &[u8]) -> std::io::Result<bool> {
        let mut guard = self.write_half.lock().await;
        match guard.as_mut() {
            Some(stream) => {
                stream.write_all(frame).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn is_writable(&self) -> bool {
        self.write_half.lock().await.is_some()
    }

    /// Shut down and drop the write half so remote peers observe a clean
    /// EOF (spec §4.4 `stop()`: "closes all connection write streams").
    pub async fn close(&self) {
        if let Some(mut stream) = self.write_half.lock().await.take() {
            let _ = stream.shutdown().await;
        }
    }

    pub async fn set_name(&self, name: String) {
        *self.name.lock().await = name;
    }

    pub async fn snapshot_name(&self) -> String {
        self.name.lock().await.clone()
    }
}

/// Allocates monotonically increasing connection generations.
#[derive(Default)]
pub struct GenerationCounter(AtomicU64);

impl GenerationCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// The connection table: a lock-free-read map from endpoint to the
/// currently live `Connection` for it.
#[derive(Default)]
pub struct ConnectionTable {
    connections: DashMap<SocketAddr, Arc<Connection>>,
    generations: GenerationCounter,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection. If one already exists for
    /// this endpoint (a reconnect racing a still-draining old handler),
    /// the prior entry is closed and replaced.
    pub async fn insert(&self, endpoint: SocketAddr, write_half: OwnedWriteHalf) -> Arc<Connection> {
        if let Some((_, old)) = self.connections.remove(&endpoint) {
            old.close().await;
        }
        let generation = self.generations.next();
        let conn = Arc::new(Connection::new(endpoint, generation, write_half));
        self.connections.insert(endpoint, conn.clone());
        conn
    }

    /// Remove `endpoint` only if the entry still matches `generation` —
    /// the compare-and-swap-against-the-previous-value semantics spec §5
    /// requires, so a handler that raced a replacement never removes the
    /// newer connection.
    pub fn remove_if_current(&self, endpoint: &SocketAddr, generation: u64) {
        self.connections
            .remove_if(endpoint, |_, conn| conn.generation == generation);
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<Arc<Connection>> {
        self.connections.get(endpoint).map(|r| r.value().clone())
    }

    pub async fn update_name(&self, endpoint: &SocketAddr, name: String) -> bool {
        match self.get(endpoint) {
            Some(conn) => {
                conn.set_name(name).await;
                true
            }
            None => false,
        }
    }

    /// A name-ordered snapshot of currently connected clients.
    pub async fn connected_clients(&self) -> Vec<(SocketAddr, String)> {
        let mut out = Vec::with_capacity(self.connections.len());
        for entry in self.connections.iter() {
            out.push((*entry.key(), entry.value().snapshot_name().await));
        }
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }

    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove(&self, endpoint: &SocketAddr) {
        self.connections.remove(endpoint);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
