//! Hub HTTP surface: health/metrics, the push-transport WebSocket accept
//! endpoint, the universal-token and operator CRUD routes (`SPEC_FULL.md`
//! §6). Grounded in the donor's `build_router` layering (governor rate
//! limit, compression, tracing, permissive CORS), generalized to this
//! domain's route set.

pub mod alerts;
pub mod health;
pub mod metrics;
pub mod push_ws;
pub mod quiet_hours;
pub mod stats;
pub mod systems;
pub mod universal_token;

use crate::hub::HubState;
use axum::Router;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete hub HTTP router.
///
/// Rate limiting: IP-based, 20 req/s sustained, burst of 50. Returns HTTP
/// 429 on burst exhaustion automatically via `GovernorLayer`.
pub fn build_router(state: Arc<HubState>) -> Router {
    let api_routes = Router::new()
        .route("/systems", axum::routing::get(systems::list_systems))
        .route("/systems/{id}", axum::routing::get(systems::get_system))
        .route("/systems/{id}/stats", axum::routing::get(stats::get_system_stats))
        .route(
            "/alerts",
            axum::routing::get(alerts::list_alerts).post(alerts::create_alert),
        )
        .route("/alerts/{id}", axum::routing::delete(alerts::delete_alert))
        .route(
            "/quiet-hours",
            axum::routing::get(quiet_hours::list_quiet_hours).post(quiet_hours::create_quiet_hours),
        )
        .route("/quiet-hours/{id}", axum::routing::delete(quiet_hours::delete_quiet_hours))
        .route(
            "/universal-token",
            axum::routing::get(universal_token::get_universal_token).post(universal_token::set_universal_token),
        );

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .finish()
            .expect("valid governor config"),
    );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", axum::routing::get(health::get_health))
        .route("/metrics", axum::routing::get(metrics::get_metrics))
        .route("/push", axum::routing::get(push_ws::push_accept))
        .layer(GovernorLayer { config: governor_config })
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
