//! Application state

use anime_auth::AuthGate;
use anime_db::Database;

/// Handle used to render Prometheus metrics
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gate: AuthGate,
    pub metrics: Option<MetricsHandle>,
}

impl AppState {
    pub fn new(db: Database, gate: AuthGate, metrics: Option<MetricsHandle>) -> Self {
        Self { db, gate, metrics }
    }
}
