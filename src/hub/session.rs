//! Session registry (`spec.md` §4.6, component C7): `system_id -> live agent
//! session` plus last-seen bookkeeping. Both transports implement the same
//! `request_snapshot` contract (`spec.md` §9 "dual transport abstraction"),
//! so the scheduler is transport-agnostic. Grounded in the donor's
//! `HubState` `RwLock`-guarded maps (`api_key_cache: RwLock<HashMap<...>>`).

use crate::wire::SystemSnapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Pull,
    Push,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no live session for this system")]
    NoSession,
    #[error("push session closed before replying")]
    Closed,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

/// A handle to an already-connected push-transport session (`spec.md` §4.4):
/// the hub may ask the agent to "sample now" over the existing connection
/// rather than opening a new one.
#[derive(Clone)]
pub struct PushHandle {
    to_agent: tokio::sync::mpsc::UnboundedSender<crate::wire::PushFrame>,
    pending: Arc<Mutex<Option<oneshot::Sender<SystemSnapshot>>>>,
}

impl PushHandle {
    pub fn new(to_agent: tokio::sync::mpsc::UnboundedSender<crate::wire::PushFrame>) -> Self {
        Self { to_agent, pending: Arc::new(Mutex::new(None)) }
    }

    /// Called by the WS task whenever a `Sample` frame arrives, solicited or
    /// not; fulfils a pending `request_snapshot` call if one is waiting.
    pub async fn deliver(&self, snapshot: SystemSnapshot) {
        if let Some(tx) = self.pending.lock().await.take() {
            let _ = tx.send(snapshot);
        }
    }

    pub async fn request_snapshot(&self, timeout: Duration) -> Result<SystemSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);

        if self.to_agent.send(crate::wire::PushFrame::SampleReq).is_err() {
            self.pending.lock().await.take();
            return Err(SessionError::Closed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.pending.lock().await.take();
                Err(SessionError::Timeout)
            }
        }
    }
}

pub struct SessionEntry {
    pub transport: TransportKind,
    pub last_ok: Option<DateTime<Utc>>,
    pub last_err: Option<String>,
    pub consecutive_fail: i32,
    pub push: Option<PushHandle>,
}

impl SessionEntry {
    fn new(transport: TransportKind) -> Self {
        Self { transport, last_ok: None, last_err: None, consecutive_fail: 0, push: None }
    }
}

/// Process-wide `system_id -> live session` map. Mutation is serialised
/// through the `RwLock`; readers see a consistent (if momentarily stale)
/// snapshot (`spec.md` §5 "Shared resources").
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a live push session for `system_id`.
    pub async fn register_push(&self, system_id: &str, handle: PushHandle) {
        let mut map = self.entries.write().await;
        let entry = map
            .entry(system_id.to_string())
            .or_insert_with(|| SessionEntry::new(TransportKind::Push));
        entry.transport = TransportKind::Push;
        entry.push = Some(handle);
    }

    pub async fn remove_push(&self, system_id: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(system_id) {
            entry.push = None;
        }
    }

    pub async fn push_handle(&self, system_id: &str) -> Option<PushHandle> {
        self.entries.read().await.get(system_id).and_then(|e| e.push.clone())
    }

    pub async fn record_success(&self, system_id: &str) {
        let mut map = self.entries.write().await;
        let entry = map
            .entry(system_id.to_string())
            .or_insert_with(|| SessionEntry::new(TransportKind::Pull));
        entry.last_ok = Some(Utc::now());
        entry.last_err = None;
        entry.consecutive_fail = 0;
    }

    /// Returns the new consecutive-failure count.
    pub async fn record_failure(&self, system_id: &str, err: &str) -> i32 {
        let mut map = self.entries.write().await;
        let entry = map
            .entry(system_id.to_string())
            .or_insert_with(|| SessionEntry::new(TransportKind::Pull));
        entry.last_err = Some(err.to_string());
        entry.consecutive_fail += 1;
        entry.consecutive_fail
    }

    pub async fn transport_kind(&self, system_id: &str) -> Option<TransportKind> {
        self.entries.read().await.get(system_id).map(|e| e.transport)
    }
}
