//! Anime Service REST API
//!
//! This crate provides the Axum-based HTTP API: anime CRUD, user
//! provisioning and actuator endpoints, all behind the auth gate.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
