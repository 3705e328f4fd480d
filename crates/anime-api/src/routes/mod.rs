//! API routes

mod actuator;
mod animes;
pub mod types;
mod users;

use anime_auth::auth_middleware;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::state::AppState;

/// Largest request body accepted (64 KiB)
const MAX_BODY_SIZE: usize = 64 * 1024;

async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": 404,
            "code": "NOT_FOUND",
            "message": format!("No route for {}", uri.path()),
        })),
    )
        .into_response()
}

/// Create the main router
///
/// Every route, the fallback included, sits behind the auth gate.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(actuator::routes())
        .merge(animes::routes())
        .merge(users::routes())
        .fallback(not_found)
        .layer(from_fn_with_state(state.gate.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
