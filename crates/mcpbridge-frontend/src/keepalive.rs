//! MCP client keepalive (spec §4.6): every `KEEPALIVE_INTERVAL`, send an
//! MCP ping bounded by `KEEPALIVE_TIMEOUT`. After
//! `KEEPALIVE_MAX_CONSECUTIVE_FAILURES` in a row, stop the task and log
//! once — this never tears down the MCP session itself, only the
//! keepalive loop.

use async_trait::async_trait;
use mcpbridge_config::constants::{
    KEEPALIVE_INTERVAL, KEEPALIVE_MAX_CONSECUTIVE_FAILURES, KEEPALIVE_TIMEOUT,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Whatever can send a ping over the MCP transport and report success.
/// A narrow interface rather than depending on the transport type here
/// (spec §9: callbacks over back-pointers).
#[async_trait]
pub trait PingSender: Send + Sync {
    async fn ping(&self) -> bool;
}

pub struct Keepalive {
    consecutive_failures: AtomicU32,
}

impl Keepalive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            consecutive_failures: AtomicU32::new(0),
        })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Spawn the keepalive loop. Returns a cancellation handle; the loop
    /// also self-terminates after too many consecutive failures.
    pub fn start(self: &Arc<Self>, sender: Arc<dyn PingSender>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let this = self.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tokio::time::sleep(KEEPALIVE_INTERVAL) => {}
                }

                let succeeded = tokio::time::timeout(KEEPALIVE_TIMEOUT, sender.ping())
                    .await
                    .unwrap_or(false);

                if succeeded {
                    this.consecutive_failures.store(0, Ordering::SeqCst);
                    continue;
                }

                let failures = this.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= KEEPALIVE_MAX_CONSECUTIVE_FAILURES {
                    tracing::warn!(
                        failures,
                        "keepalive: too many consecutive ping failures, stopping keepalive task"
                    );
                    break;
                }
            }
        });
        cancel
    }
}
