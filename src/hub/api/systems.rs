//! Operator read surface over known systems (`SPEC_FULL.md` §6:
//! `GET /api/systems[/{id}]`).

use crate::hub::auth::AdminAuth;
use crate::hub::model::System;
use crate::hub::HubState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

pub async fn list_systems(_auth: AdminAuth, State(hub): State<Arc<HubState>>) -> Result<Json<Vec<System>>, StatusCode> {
    hub.store.list_systems().await.map(Json).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn get_system(
    _auth: AdminAuth,
    State(hub): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<Json<System>, StatusCode> {
    match hub.store.get_system(&id).await {
        Ok(Some(system)) => Ok(Json(system)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
