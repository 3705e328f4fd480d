//! Actuator endpoints: health, info and Prometheus metrics

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: HealthComponents,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub db: &'static str,
}

/// Build information response
#[derive(Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// GET /actuator/health
async fn health(State(state): State<AppState>) -> Response {
    metrics::counter!("anime_health_checks_total").increment(1);

    match state.db.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "UP",
            components: HealthComponents { db: "UP" },
        })
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "DOWN",
                    components: HealthComponents { db: "DOWN" },
                }),
            )
                .into_response()
        }
    }
}

/// GET /actuator/info
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "anime-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /actuator/prometheus
async fn prometheus(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Create actuator routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/actuator/health", get(health))
        .route("/actuator/info", get(info))
        .route("/actuator/prometheus", get(prometheus))
}
