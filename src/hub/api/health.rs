//! Health check endpoint (`SPEC_FULL.md` §2 ambient stack: operator REST
//! surface), grounded in the donor's `hub::api::health::get_health`.

use crate::hub::HubState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub known_systems: usize,
}

pub async fn get_health(State(hub): State<Arc<HubState>>) -> Json<HealthResponse> {
    let systems = hub.store.list_systems().await;
    let store_connected = systems.is_ok();

    Json(HealthResponse {
        status: if store_connected { "healthy".to_string() } else { "degraded".to_string() },
        store_connected,
        known_systems: systems.map(|s| s.len()).unwrap_or(0),
    })
}
