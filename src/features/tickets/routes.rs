use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::tickets::handlers;
use crate::features::tickets::services::TicketService;

/// Create routes for the tickets feature
///
/// Note: This feature requires authentication
pub fn routes(service: Arc<TicketService>) -> Router {
    Router::new()
        .route(
            "/api/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route("/api/tickets/catalog", get(handlers::get_catalog))
        .route(
            "/api/tickets/{id}",
            get(handlers::get_ticket).patch(handlers::update_ticket),
        )
        .route("/api/tickets/{id}/start", post(handlers::start_service))
        .route("/api/tickets/{id}/finish", post(handlers::finish_service))
        .route("/api/tickets/{id}/feedback", post(handlers::submit_feedback))
        .with_state(service)
}
