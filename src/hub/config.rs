//! Hub configuration — environment variables, CLI overlay, defaults
//! (`spec.md` §4.2-style `from_env` constructor, donor's `HubConfig::from_env`
//! shape generalized to the hub binary).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// SQLite database URL (e.g. `sqlite://beszel.db` or `sqlite::memory:`).
    pub database_url: String,
    /// Bind address for the REST/WebSocket HTTP server.
    pub bind_address: String,
    /// Bearer token gating the operator REST surface and `/universal-token`.
    pub admin_key: String,
    /// Poll-scheduler tick period (`spec.md` §4.6: "~58s").
    pub poll_tick: Duration,
    /// Consecutive poll failures before a system is marked `down`
    /// (`spec.md` §3/§9: pinned at 2, tunable).
    pub down_after_failures: i32,
    /// Retention sweep cadence (`spec.md` §4.9: "every few hours").
    pub retention_sweep_interval: Duration,
    /// Default push-transport sample cadence handed to agents in `HELLO_OK`.
    pub push_sample_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://beszel.db".to_string(),
            bind_address: "0.0.0.0:8090".to_string(),
            admin_key: String::new(),
            poll_tick: Duration::from_secs(58),
            down_after_failures: 2,
            retention_sweep_interval: Duration::from_secs(4 * 3600),
            push_sample_interval_secs: 60,
        }
    }
}

impl HubConfig {
    /// Load configuration from the process environment, with CLI overrides
    /// for the values commonly passed on the command line.
    ///
    /// Returns an error in release builds when `HUB_ADMIN_KEY` is not set,
    /// preventing the hub from starting with a publicly known default.
    pub fn from_env(
        database_url: Option<String>,
        bind_address: Option<String>,
        port: Option<u16>,
    ) -> anyhow::Result<Self> {
        let mut config = Self::default();

        config.database_url = database_url
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or(config.database_url);

        if let Some(addr) = bind_address {
            config.bind_address = addr;
        } else if let Some(p) = port {
            config.bind_address = format!("0.0.0.0:{p}");
        } else if let Ok(addr) = std::env::var("HUB_BIND_ADDRESS") {
            config.bind_address = addr;
        }

        config.admin_key = match std::env::var("HUB_ADMIN_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                if cfg!(debug_assertions) {
                    tracing::warn!("HUB_ADMIN_KEY not set, using default dev key — do NOT use in production");
                    "dev-admin-key".to_string()
                } else {
                    anyhow::bail!(
                        "HUB_ADMIN_KEY environment variable is not set. \
                         The hub cannot start in release mode without an admin key."
                    );
                }
            }
        };

        if let Ok(v) = std::env::var("HUB_POLL_TICK_SECS") {
            if let Ok(n) = v.parse() {
                config.poll_tick = Duration::from_secs(n);
            }
        }
        if let Ok(v) = std::env::var("HUB_DOWN_AFTER_FAILURES") {
            if let Ok(n) = v.parse() {
                config.down_after_failures = n;
            }
        }
        if let Ok(v) = std::env::var("HUB_RETENTION_SWEEP_SECS") {
            if let Ok(n) = v.parse() {
                config.retention_sweep_interval = Duration::from_secs(n);
            }
        }
        if let Ok(v) = std::env::var("HUB_PUSH_SAMPLE_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                config.push_sample_interval_secs = n;
            }
        }

        Ok(config)
    }
}
