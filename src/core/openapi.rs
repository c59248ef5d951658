use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::statistics::{
    dtos as statistics_dtos, handlers as statistics_handlers, services as statistics_services,
};
use crate::features::tickets::{
    dtos as tickets_dtos, handlers as tickets_handlers, models as tickets_models,
};
use crate::shared::types::{ApiResponse, Meta, StatusCounts};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Tickets (protected)
        tickets_handlers::create_ticket,
        tickets_handlers::list_tickets,
        tickets_handlers::get_catalog,
        tickets_handlers::get_ticket,
        tickets_handlers::start_service,
        tickets_handlers::finish_service,
        tickets_handlers::update_ticket,
        tickets_handlers::submit_feedback,
        // Statistics (admin)
        statistics_handlers::get_statistics,
    ),
    components(
        schemas(
            // Shared
            Meta,
            StatusCounts,
            // Auth
            auth::model::Role,
            auth::model::AuthenticatedUser,
            // Tickets
            tickets_models::TicketStatus,
            tickets_models::TicketUrgency,
            tickets_models::HistoryEntryType,
            tickets_dtos::CreateTicketDto,
            tickets_dtos::FinishTicketDto,
            tickets_dtos::UpdateTicketDto,
            tickets_dtos::SubmitFeedbackDto,
            tickets_dtos::HistoryEntryDto,
            tickets_dtos::TicketResponseDto,
            tickets_dtos::TicketCatalogDto,
            ApiResponse<Vec<tickets_dtos::TicketResponseDto>>,
            ApiResponse<tickets_dtos::TicketResponseDto>,
            ApiResponse<tickets_dtos::TicketCatalogDto>,
            // Statistics
            statistics_services::Statistics,
            statistics_dtos::StatisticsReportDto,
            ApiResponse<statistics_dtos::StatisticsReportDto>,
        )
    ),
    tags(
        (name = "tickets", description = "Support tickets: filing, service lifecycle and feedback"),
        (name = "statistics", description = "Service statistics report (admin only)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Helpdesk API",
        version = "0.1.0",
        description = "API documentation for the helpdesk ticketing service",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_ticket_and_statistics_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/tickets",
            "/api/tickets/catalog",
            "/api/tickets/{id}",
            "/api/tickets/{id}/start",
            "/api/tickets/{id}/finish",
            "/api/tickets/{id}/feedback",
            "/api/statistics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
