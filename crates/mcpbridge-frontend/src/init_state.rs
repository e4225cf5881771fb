//! Per-MCP-session initialize state machine (spec §3 `InitializationState`,
//! §4.6 "Enforce a Mutex on initialization state"). Monotonic:
//! `NotStarted -> Initializing -> Completed`. Concurrent callers that
//! arrive while a session is `Initializing` await the same in-flight
//! result rather than re-running the initialize work — the
//! "Mutex-style guard... awaiting a Promise-equivalent" spec §9 asks for,
//! modeled with a `tokio::sync::Mutex` guarding a shared
//! `tokio::sync::broadcast`-backed future instead of an OS lock.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

#[derive(Debug, Clone)]
pub struct InitializeResult(pub Value);

#[derive(Clone)]
enum Phase {
    NotStarted,
    Initializing(broadcast::Sender<InitializeResult>),
    Completed(InitializeResult),
}

/// Guards a single MCP session's initialize handshake so that concurrent
/// `initialize` calls (a client retry racing the original, for instance)
/// converge on one computed result instead of running the editor-connect
/// and tool-fetch work twice.
pub struct InitGuard {
    phase: Mutex<Phase>,
}

impl Default for InitGuard {
    fn default() -> Self {
        Self {
            phase: Mutex::new(Phase::NotStarted),
        }
    }
}

/// What the caller should do after calling [`InitGuard::begin`].
pub enum InitAction {
    /// This caller is the first in; it must run the initialize work and
    /// call [`InitGuard::complete`] with the result.
    Run,
    /// Another caller is already running initialize; await this receiver
    /// for the result instead of doing the work again.
    Await(broadcast::Receiver<InitializeResult>),
    /// Initialize already completed; here's the cached result.
    Cached(InitializeResult),
}

impl InitGuard {
    pub async fn begin(&self) -> InitAction {
        let mut phase = self.phase.lock().await;
        match &*phase {
            Phase::NotStarted => {
                let (tx, _rx) = broadcast::channel(1);
                let action_rx = tx.subscribe();
                *phase = Phase::Initializing(tx);
                // Drop the action_rx subscription taken before any value is
                // sent; `Run` callers don't need a receiver of their own.
                drop(action_rx);
                InitAction::Run
            }
            Phase::Initializing(tx) => InitAction::Await(tx.subscribe()),
            Phase::Completed(result) => InitAction::Cached(result.clone()),
        }
    }

    /// Called only by the `Run` caller once the initialize result is
    /// ready. Wakes every `Await`-ing caller and transitions to
    /// `Completed`.
    pub async fn complete(&self, result: InitializeResult) {
        let mut phase = self.phase.lock().await;
        if let Phase::Initializing(tx) = &*phase {
            let _ = tx.send(result.clone());
        }
        *phase = Phase::Completed(result);
    }
}

pub type SharedInitGuard = Arc<InitGuard>;
