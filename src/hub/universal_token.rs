//! The universal token (`spec.md` §4.5/glossary): a process-scoped, one-hour
//! secret that authorises enrollment of any new system while active. Grounded
//! in the donor's in-memory pending-state pattern (`hub::api::pairing`'s
//! short-lived-code map) generalized to a single optional slot rather than a
//! map, since there is at most one universal token at a time.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use tokio::sync::RwLock;

const TOKEN_LIFETIME: ChronoDuration = ChronoDuration::hours(1);

#[derive(Debug, Clone)]
struct TokenState {
    value: String,
    expires_at: DateTime<Utc>,
    active: bool,
}

/// Shared, mutation-serialised holder for the current universal token.
pub struct UniversalToken {
    state: RwLock<Option<TokenState>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UniversalTokenStatus {
    pub token: Option<String>,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UniversalToken {
    pub fn new() -> Self {
        Self { state: RwLock::new(None) }
    }

    /// `POST /universal-token { enable: true }` — mint or reactivate a token.
    pub async fn enable(&self) -> UniversalTokenStatus {
        let mut guard = self.state.write().await;
        let now = Utc::now();
        let reuse = guard.as_ref().filter(|s| s.active && s.expires_at > now).is_some();

        if !reuse {
            let mut bytes = [0u8; 24];
            rand::thread_rng().fill_bytes(&mut bytes);
            *guard = Some(TokenState {
                value: hex_encode(&bytes),
                expires_at: now + TOKEN_LIFETIME,
                active: true,
            });
        } else if let Some(s) = guard.as_mut() {
            s.active = true;
        }

        status_of(&guard)
    }

    /// `POST /universal-token { enable: false }`.
    pub async fn disable(&self) -> UniversalTokenStatus {
        let mut guard = self.state.write().await;
        if let Some(s) = guard.as_mut() {
            s.active = false;
        }
        status_of(&guard)
    }

    /// `GET /universal-token`.
    pub async fn status(&self) -> UniversalTokenStatus {
        let guard = self.state.read().await;
        status_of(&guard)
    }

    /// Does `token` match the currently active, unexpired universal token?
    pub async fn matches(&self, token: &str) -> bool {
        let guard = self.state.read().await;
        match guard.as_ref() {
            Some(s) => s.active && s.expires_at > Utc::now() && s.value == token,
            None => false,
        }
    }
}

impl Default for UniversalToken {
    fn default() -> Self {
        Self::new()
    }
}

fn status_of(state: &Option<TokenState>) -> UniversalTokenStatus {
    match state {
        Some(s) => UniversalTokenStatus {
            token: Some(s.value.clone()),
            active: s.active && s.expires_at > Utc::now(),
            expires_at: Some(s.expires_at),
        },
        None => UniversalTokenStatus { token: None, active: false, expires_at: None },
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_token_never_matches() {
        let t = UniversalToken::new();
        let status = t.enable().await;
        let token = status.token.unwrap();
        t.disable().await;
        assert!(!t.matches(&token).await);
    }

    #[tokio::test]
    async fn enabling_twice_reuses_token_while_unexpired() {
        let t = UniversalToken::new();
        let first = t.enable().await.token.unwrap();
        let second = t.enable().await.token.unwrap();
        assert_eq!(first, second);
    }
}
