//! Universal-token REST surface (`spec.md` §4.5/glossary), gated by
//! [`crate::hub::auth::AdminAuth`].

use crate::hub::universal_token::UniversalTokenStatus;
use crate::hub::HubState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use crate::hub::auth::AdminAuth;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SetUniversalTokenRequest {
    pub enable: bool,
}

pub async fn get_universal_token(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
) -> Json<UniversalTokenStatus> {
    Json(hub.universal_token.status().await)
}

pub async fn set_universal_token(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Json(req): Json<SetUniversalTokenRequest>,
) -> Json<UniversalTokenStatus> {
    let status = if req.enable { hub.universal_token.enable().await } else { hub.universal_token.disable().await };
    Json(status)
}
