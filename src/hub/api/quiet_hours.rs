//! Quiet-hours CRUD (`SPEC_FULL.md` §6: `POST/GET/DELETE /api/quiet-hours`).

use crate::hub::auth::AdminAuth;
use crate::hub::model::{QuietHours, QuietHoursKind};
use crate::hub::HubState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateQuietHoursRequest {
    pub user: String,
    pub system: Option<String>,
    pub kind: QuietHoursKind,
    pub start: String,
    pub end: String,
}

pub async fn list_quiet_hours(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
) -> Result<Json<Vec<QuietHours>>, StatusCode> {
    hub.store.list_quiet_hours().await.map(Json).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn create_quiet_hours(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Json(req): Json<CreateQuietHoursRequest>,
) -> Result<Json<QuietHours>, StatusCode> {
    let q = QuietHours {
        id: uuid::Uuid::new_v4().to_string(),
        user: req.user,
        system: req.system,
        kind: req.kind,
        start: req.start,
        end: req.end,
    };

    hub.store.create_quiet_hours(&q).await.map(|_| Json(q)).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn delete_quiet_hours(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    hub.store
        .delete_quiet_hours(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
