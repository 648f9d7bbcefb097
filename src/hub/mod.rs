//! Hub — central collector/evaluator process (`spec.md` §2, components
//! C6–C12): session registry, poll scheduler, record store, rollup/retention
//! engines, alert evaluator, enrollment, and the operator REST surface.
//!
//! ## Modules
//!
//! - `config` — hub configuration (env vars, CLI overlay)
//! - `db` — SQLite connection pool and migration runner
//! - `model` — hub-only persisted shapes (`System`, `Fingerprint`, `Alert`, ...)
//! - `store` — the `Store` trait and its `sqlite` implementation
//! - `session` — `system_id -> live session` registry (C7)
//! - `scheduler` — fair, bounded poll driver (C8)
//! - `writer` — post-insert orchestration: rollup + alert (C9)
//! - `rollup` — downsampling cascade (C10)
//! - `retention` — periodic bucket sweeper (C11)
//! - `alert` — threshold/duration/dedup evaluator + dispatch (C12)
//! - `enrollment` — token/fingerprint registration and pinning (C6)
//! - `universal_token` — the process-scoped enrollment secret
//! - `quiet_hours` — alert-dispatch suppression windows
//! - `notify` — pluggable alert dispatch sink
//! - `pull_client` — hub-side SSH client for the pull transport
//! - `auth` — admin Bearer-token extractor for the operator REST surface
//! - `api` — HTTP route handlers (health, metrics, enrollment, operator CRUD)

pub mod alert;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod enrollment;
pub mod model;
pub mod notify;
pub mod pull_client;
pub mod quiet_hours;
pub mod retention;
pub mod rollup;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod universal_token;
pub mod writer;

use config::HubConfig;
use notify::Notifier;
use session::SessionRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use store::{sqlite::SqliteStore, Store};
use universal_token::UniversalToken;

/// Shared hub application state, handed to every `axum` handler and
/// background task (`SPEC_FULL.md` §4.6: grounded in the donor's
/// `Arc<HubState>` with `RwLock`-guarded maps).
pub struct HubState {
    pub store: Arc<dyn Store>,
    pub config: HubConfig,
    pub registry: Arc<SessionRegistry>,
    pub universal_token: Arc<UniversalToken>,
    pub notifier: Arc<dyn Notifier>,
    /// The hub's own SSH keypair, used to authenticate outbound pull-client
    /// connections to agents (`spec.md` §4.3 consumer side).
    pub hub_key: Arc<russh_keys::key::KeyPair>,
}

impl HubState {
    pub fn new(pool: SqlitePool, config: HubConfig, hub_key: russh_keys::key::KeyPair) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(SqliteStore::new(pool)),
            config,
            registry: Arc::new(SessionRegistry::new()),
            universal_token: Arc::new(UniversalToken::new()),
            notifier: Arc::new(notify::LogNotifier),
            hub_key: Arc::new(hub_key),
        })
    }
}
