use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::statistics::handlers;
use crate::features::statistics::services::StatisticsService;

/// Create routes for the statistics report (admin only)
pub fn routes(service: Arc<StatisticsService>) -> Router {
    Router::new()
        .route("/api/statistics", get(handlers::get_statistics))
        .with_state(service)
}
