//! Admin Bearer-token extractor gating `/universal-token` and the operator
//! REST surface (`spec.md` §4.5, `SPEC_FULL.md` §4.5: "the same `AdminAuth`
//! Bearer extractor pattern" as the donor's `hub::auth::api_key::AdminAuth`,
//! simplified here to a single shared admin key — this hub has no
//! per-rig/per-tenant API keys to verify against a database).

use crate::hub::HubState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Extracted when the request's `Authorization: Bearer <token>` header
/// matches `HubConfig::admin_key`.
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<Arc<HubState>> for AdminAuth {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &Arc<HubState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { error: "missing bearer token".to_string() }))
            })?;

        if token == state.config.admin_key {
            Ok(AdminAuth)
        } else {
            Err((StatusCode::FORBIDDEN, Json(ErrorResponse { error: "invalid admin key".to_string() })))
        }
    }
}
