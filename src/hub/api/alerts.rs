//! Alert CRUD (`SPEC_FULL.md` §6: `POST/GET/DELETE /api/alerts[/{id}]`).

use crate::hub::auth::AdminAuth;
use crate::hub::model::{Alert, AlertState, Metric};
use crate::hub::HubState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub user: String,
    pub system: Option<String>,
    pub metric: Metric,
    pub threshold: f64,
    pub min_minutes: i64,
}

pub async fn list_alerts(_auth: AdminAuth, State(hub): State<Arc<HubState>>) -> Result<Json<Vec<Alert>>, StatusCode> {
    hub.store.list_alerts().await.map(Json).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn create_alert(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<Json<Alert>, StatusCode> {
    let alert = Alert {
        id: uuid::Uuid::new_v4().to_string(),
        user: req.user,
        system: req.system,
        metric: req.metric,
        threshold: req.threshold,
        min_minutes: req.min_minutes,
        state: AlertState::Idle,
    };

    hub.store
        .create_alert(&alert)
        .await
        .map(|_| Json(alert))
        .map_err(|err| match err {
            crate::hub::store::StoreError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })
}

pub async fn delete_alert(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    hub.store.delete_alert(&id).await.map(|_| StatusCode::NO_CONTENT).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
