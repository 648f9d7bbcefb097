//! Hub Prometheus metrics endpoint (`SPEC_FULL.md` §2 ambient stack: a
//! Non-goal in `spec.md` excludes the operator UI, not observability), grounded
//! in the donor's `hub::api::metrics::get_metrics` text-format exporter.
//!
//! Exposed gauges:
//! - `beszel_hub_systems_total{status=...}` — known systems by lifecycle status
//! - `beszel_hub_active_alerts_total` — alerts currently `triggered`
//! - `beszel_hub_universal_token_active` — 1 if the enrollment token is active

use crate::hub::model::{AlertState, SystemStatus};
use crate::hub::HubState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;

/// No authentication required — metrics are scraped by Prometheus without
/// per-request credentials.
pub async fn get_metrics(State(hub): State<Arc<HubState>>) -> impl IntoResponse {
    let systems = hub.store.list_systems().await.unwrap_or_default();
    let alerts = hub.store.list_alerts().await.unwrap_or_default();

    let mut by_status = [0u64; 4];
    for system in &systems {
        let idx = match system.status {
            SystemStatus::Pending => 0,
            SystemStatus::Up => 1,
            SystemStatus::Down => 2,
            SystemStatus::Paused => 3,
        };
        by_status[idx] += 1;
    }

    let active_alerts = alerts.iter().filter(|a| a.state == AlertState::Triggered).count();
    let universal_token_active = hub.universal_token.status().await.active as u8;

    let mut body = String::with_capacity(512);
    body.push_str("# HELP beszel_hub_systems_total Known systems by lifecycle status\n");
    body.push_str("# TYPE beszel_hub_systems_total gauge\n");
    for (status, count) in [
        (SystemStatus::Pending, by_status[0]),
        (SystemStatus::Up, by_status[1]),
        (SystemStatus::Down, by_status[2]),
        (SystemStatus::Paused, by_status[3]),
    ] {
        body.push_str(&format!("beszel_hub_systems_total{{status=\"{status}\"}} {count}\n"));
    }

    body.push_str("# HELP beszel_hub_active_alerts_total Alerts currently triggered\n");
    body.push_str("# TYPE beszel_hub_active_alerts_total gauge\n");
    body.push_str(&format!("beszel_hub_active_alerts_total {active_alerts}\n"));

    body.push_str("# HELP beszel_hub_universal_token_active Whether the universal enrollment token is active\n");
    body.push_str("# TYPE beszel_hub_universal_token_active gauge\n");
    body.push_str(&format!("beszel_hub_universal_token_active {universal_token_active}\n"));

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body)
}
