//! Enrollment handler (`spec.md` §4.5, component C6): token/fingerprint
//! registration and pinning, triggered by either the pull-side poller's
//! first contact or the push transport's `HELLO` frame.

use crate::hub::store::Store;
use crate::hub::universal_token::UniversalToken;
use crate::wire::EnrollmentRejectReason;

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("fingerprint mismatch")]
    FingerprintMismatch,
    #[error("fingerprint blocked by operator")]
    Blocked,
    #[error("token does not match any known system or an active universal token")]
    InvalidToken,
    #[error("store error: {0}")]
    Store(#[from] crate::hub::store::StoreError),
}

impl From<&EnrollmentError> for EnrollmentRejectReason {
    fn from(err: &EnrollmentError) -> Self {
        match err {
            EnrollmentError::FingerprintMismatch => EnrollmentRejectReason::FingerprintMismatch,
            EnrollmentError::Blocked => EnrollmentRejectReason::Blocked,
            EnrollmentError::InvalidToken | EnrollmentError::Store(_) => EnrollmentRejectReason::InvalidToken,
        }
    }
}

/// Outcome of a successful enrollment attempt: the resolved system id.
pub struct Enrolled {
    pub system_id: String,
}

/// Resolve a `(token, fingerprint_candidate)` pair against the store
/// (`spec.md` §4.5):
///
/// - An existing fingerprint row for `token`: blocked rows are always
///   refused; an empty stored fingerprint is filled on first auth; a
///   mismatched non-empty fingerprint is rejected without mutation.
/// - No existing row: accepted only if `token` matches the active
///   universal token, creating a new `pending` system pinned to
///   `fingerprint_candidate`.
pub async fn enroll(
    store: &dyn Store,
    universal_token: &UniversalToken,
    hostname: &str,
    host: &str,
    token: &str,
    fingerprint_candidate: &str,
) -> Result<Enrolled, EnrollmentError> {
    if let Some(existing) = store.find_fingerprint_by_token(token).await? {
        if existing.blocked {
            return Err(EnrollmentError::Blocked);
        }
        if existing.fingerprint.is_empty() {
            store.fill_fingerprint(&existing.system_id, fingerprint_candidate).await?;
            return Ok(Enrolled { system_id: existing.system_id });
        }
        if existing.fingerprint != fingerprint_candidate {
            return Err(EnrollmentError::FingerprintMismatch);
        }
        return Ok(Enrolled { system_id: existing.system_id });
    }

    if universal_token.matches(token).await {
        let system = store
            .create_system_with_fingerprint(hostname, host, fingerprint_candidate, token)
            .await?;
        return Ok(Enrolled { system_id: system.id });
    }

    Err(EnrollmentError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::store::sqlite::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn first_enrollment_via_universal_token_creates_pending_system() {
        let store = memory_store().await;
        let ut = UniversalToken::new();
        let status = ut.enable().await;
        let token = status.token.unwrap();

        let result = enroll(&store, &ut, "host1", "10.0.0.5", &token, "fp1").await.unwrap();
        let system = store.get_system(&result.system_id).await.unwrap().unwrap();
        assert_eq!(system.status, crate::hub::model::SystemStatus::Pending);

        let fp = store.get_fingerprint(&result.system_id).await.unwrap().unwrap();
        assert_eq!(fp.fingerprint, "fp1");
    }

    #[tokio::test]
    async fn fingerprint_rebind_is_rejected() {
        let store = memory_store().await;
        let ut = UniversalToken::new();
        let token = ut.enable().await.token.unwrap();

        let enrolled = enroll(&store, &ut, "host1", "10.0.0.5", &token, "fp1").await.unwrap();
        store.fill_fingerprint(&enrolled.system_id, "fp1").await.unwrap();

        let err = enroll(&store, &ut, "host1", "10.0.0.5", &token, "fp2").await.unwrap_err();
        assert!(matches!(err, EnrollmentError::FingerprintMismatch));
    }

    #[tokio::test]
    async fn unknown_token_without_universal_token_is_rejected() {
        let store = memory_store().await;
        let ut = UniversalToken::new();
        let err = enroll(&store, &ut, "host1", "10.0.0.5", "not-a-real-token", "fp1").await.unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidToken));
    }
}
