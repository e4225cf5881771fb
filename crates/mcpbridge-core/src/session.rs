//! The session record is the small piece of state that must survive the
//! host editor's domain-reload (in-process reset while the OS process
//! itself lives on). It is read and written through a host-provided
//! key/value store abstraction so the lifecycle controller never assumes
//! a particular persistence backend.

use crate::error::SessionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Crash/reload-surviving state, persisted as a flat set of keys (spec §6:
/// "no structure is required beyond the keys enumerated").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub running: bool,
    pub port: Option<u16>,
    pub in_reload: bool,
    pub after_reload: bool,
    pub reconnecting: bool,
    pub show_reconnecting_ui: bool,
    pub show_post_reload_ui: bool,
}

const SESSION_KEY: &str = "mcpbridge.session";

/// Host-provided key/value store. The lifecycle controller is the sole
/// writer during reload transitions; reads may happen from anywhere.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> SessionResult<SessionRecord>;
    async fn save(&self, record: &SessionRecord) -> SessionResult<()>;
    async fn clear(&self) -> SessionResult<()>;
}

/// In-memory store for tests and for hosts that don't need cross-process
/// persistence (the `mcpbridge-cli host`/`dev` commands, for instance).
#[derive(Default)]
pub struct MemorySessionStore {
    record: tokio::sync::Mutex<Option<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> SessionResult<SessionRecord> {
        Ok(self.record.lock().await.clone().unwrap_or_default())
    }

    async fn save(&self, record: &SessionRecord) -> SessionResult<()> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> SessionResult<()> {
        *self.record.lock().await = None;
        Ok(())
    }
}

/// Sled-backed store for a host process that wants the session record to
/// survive a full process restart, not just a domain reload.
pub struct SledSessionStore {
    db: sled::Db,
}

impl SledSessionStore {
    pub fn open(path: &str) -> SessionResult<Self> {
        let db = sled::open(path)
            .map_err(|e| crate::error::SessionStoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl SessionStore for SledSessionStore {
    async fn load(&self) -> SessionResult<SessionRecord> {
        match self.db.get(SESSION_KEY).map_err(|e| {
            crate::error::SessionStoreError::Backend(e.to_string())
        })? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(SessionRecord::default()),
        }
    }

    async fn save(&self, record: &SessionRecord) -> SessionResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.db
            .insert(SESSION_KEY, bytes)
            .map_err(|e| crate::error::SessionStoreError::Backend(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| crate::error::SessionStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> SessionResult<()> {
        self.db
            .remove(SESSION_KEY)
            .map_err(|e| crate::error::SessionStoreError::Backend(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| crate::error::SessionStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
