//! Editor discovery (spec §4.6): reads `UNITY_TCP_PORT`, probes the
//! loopback port, and runs a single unified timer that either attempts a
//! fresh connection (when disconnected) or health-checks the existing one
//! (when connected). Single-port/env-driven only, per spec §9's resolved
//! open question — no range scanning.

use crate::editor_client::EditorClient;
use crate::error::{FrontendError, Result};
use mcpbridge_config::constants::{
    DISCOVERY_PROBE_TIMEOUT, POLLING_CYCLE_DEADLINE, POLLING_EXTENDED_INTERVAL,
    POLLING_INITIAL_ATTEMPTS, POLLING_INITIAL_INTERVAL,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Event the discovery timer reports to whoever owns front-end session
/// state (editor-connected state sync, tool refresh, spec §4.6/§4.7).
pub enum DiscoveryEvent {
    Connected(Arc<EditorClient>),
    Disconnected,
    /// An unsolicited JSON-RPC notification arrived over the editor
    /// connection (e.g. `notifications/tools/list_changed`).
    EditorNotification(Value),
}

/// Reads and validates `UNITY_TCP_PORT`. Absent or out-of-range is not a
/// retryable condition — discovery simply never starts (spec §4.6, §9).
pub fn editor_port_from_env() -> Result<u16> {
    let raw = std::env::var("UNITY_TCP_PORT").map_err(|_| FrontendError::EditorPortNotConfigured)?;
    let port: u32 = raw
        .parse()
        .map_err(|_| FrontendError::EditorPortOutOfRange(0))?;
    if port == 0 || port > u16::MAX as u32 {
        return Err(FrontendError::EditorPortOutOfRange(port));
    }
    Ok(port as u16)
}

/// Short-timeout TCP probe of `127.0.0.1:port`, used both to test whether
/// the editor is reachable and as the lightweight health check once
/// connected.
pub async fn probe_available(port: u16) -> bool {
    tokio::time::timeout(DISCOVERY_PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port)))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

/// Single-instance editor discovery timer. A process should have exactly
/// one of these; [`EditorDiscovery::singleton_or_init`] is the explicit
/// locator spec §9 calls for in place of a pseudo-static. `active_timers`
/// exists so tests (and the CLI, defensively) can detect accidental
/// duplication — it is not load-bearing for correctness.
pub struct EditorDiscovery {
    port: u16,
    connected: AtomicBool,
    active_timers: AtomicUsize,
    current_client: Mutex<Option<Arc<EditorClient>>>,
    events: mpsc::Sender<DiscoveryEvent>,
}

static SINGLETON: OnceLock<Arc<EditorDiscovery>> = OnceLock::new();

impl EditorDiscovery {
    pub fn new(port: u16, events: mpsc::Sender<DiscoveryEvent>) -> Arc<Self> {
        Arc::new(Self {
            port,
            connected: AtomicBool::new(false),
            active_timers: AtomicUsize::new(0),
            current_client: Mutex::new(None),
            events,
        })
    }

    /// Install and return the process-wide singleton, or the existing one
    /// if `init` already ran in this process.
    pub fn singleton_or_init(init: impl FnOnce() -> Arc<EditorDiscovery>) -> Arc<EditorDiscovery> {
        SINGLETON.get_or_init(init).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn active_timers(&self) -> usize {
        self.active_timers.load(Ordering::SeqCst)
    }

    pub async fn current_client(&self) -> Option<Arc<EditorClient>> {
        self.current_client.lock().await.clone()
    }

    /// Spawn the unified adaptive-polling timer. Returns a cancellation
    /// handle the caller uses on shutdown (spec §4.6 stdio/signal
    /// lifecycle: "clear any remaining timers").
    pub fn start(self: &Arc<Self>) -> (CancellationToken, tokio::task::JoinHandle<()>) {
        self.active_timers.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let this = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            this.run_loop(task_cancel).await;
            this.active_timers.fetch_sub(1, Ordering::SeqCst);
        });
        (cancel, handle)
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut cycles: u32 = 0;
        loop {
            let interval = if cycles < POLLING_INITIAL_ATTEMPTS {
                POLLING_INITIAL_INTERVAL
            } else {
                POLLING_EXTENDED_INTERVAL
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let _ = tokio::time::timeout(POLLING_CYCLE_DEADLINE, self.run_cycle()).await;
            cycles = cycles.saturating_add(1);
        }
    }

    async fn run_cycle(self: &Arc<Self>) {
        if self.connected.load(Ordering::SeqCst) {
            let still_alive = self
                .current_client
                .lock()
                .await
                .as_ref()
                .map(|c| c.is_connected())
                .unwrap_or(false)
                && probe_available(self.port).await;

            if !still_alive {
                self.connected.store(false, Ordering::SeqCst);
                *self.current_client.lock().await = None;
                let _ = self.events.send(DiscoveryEvent::Disconnected).await;
            }
            return;
        }

        if !probe_available(self.port).await {
            return;
        }

        let (notif_tx, mut notif_rx) = mpsc::channel::<Value>(64);
        if let Ok(client) = EditorClient::connect(self.port, notif_tx).await {
            self.connected.store(true, Ordering::SeqCst);
            *self.current_client.lock().await = Some(client.clone());

            let forward = self.events.clone();
            tokio::spawn(async move {
                while let Some(notification) = notif_rx.recv().await {
                    let _ = forward.send(DiscoveryEvent::EditorNotification(notification)).await;
                }
            });

            let _ = self.events.send(DiscoveryEvent::Connected(client)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_is_not_configured() {
        std::env::remove_var("UNITY_TCP_PORT");
        assert!(matches!(
            editor_port_from_env(),
            Err(FrontendError::EditorPortNotConfigured)
        ));
    }

    #[test]
    fn zero_port_is_out_of_range() {
        std::env::set_var("UNITY_TCP_PORT", "0");
        let result = editor_port_from_env();
        std::env::remove_var("UNITY_TCP_PORT");
        assert!(matches!(result, Err(FrontendError::EditorPortOutOfRange(_))));
    }

    #[test]
    fn valid_port_parses() {
        std::env::set_var("UNITY_TCP_PORT", "58888");
        let result = editor_port_from_env();
        std::env::remove_var("UNITY_TCP_PORT");
        assert_eq!(result.unwrap(), 58888);
    }

    #[tokio::test]
    async fn probe_fails_fast_against_a_closed_port() {
        let available = probe_available(1).await;
        assert!(!available);
    }

    #[tokio::test]
    async fn discovery_cycle_connects_once_editor_is_reachable() {
        use mcpbridge_runtime::{BridgeServer, RequestProcessor};
        use std::net::SocketAddr;
        use std::sync::Arc as StdArc;

        struct Noop;
        #[async_trait::async_trait]
        impl RequestProcessor for Noop {
            async fn process(&self, _e: SocketAddr, _r: &str) -> Option<String> {
                None
            }
        }

        let server = StdArc::new(BridgeServer::new(StdArc::new(Noop), None, None));
        server.start(0).await.unwrap();
        let port = server.bound_port().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let discovery = EditorDiscovery::new(port, tx);
        discovery.run_cycle().await;

        assert!(discovery.is_connected());
        match rx.recv().await {
            Some(DiscoveryEvent::Connected(_)) => {}
            _ => panic!("expected Connected event"),
        }

        server.stop().await;
    }
}
