use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::tickets::dtos::{
    CreateTicketDto, FinishTicketDto, SubmitFeedbackDto, TicketCatalogDto, TicketResponseDto,
    UpdateTicketDto,
};
use crate::features::tickets::models::TicketStatus;
use crate::features::tickets::services::TicketService;
use crate::shared::types::{ApiResponse, Meta, StatusCounts};

/// File a new ticket
#[utoipa::path(
    post,
    path = "/api/tickets",
    request_body = CreateTicketDto,
    responses(
        (status = 201, description = "Ticket created", body = ApiResponse<TicketResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn create_ticket(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    AppJson(dto): AppJson<CreateTicketDto>,
) -> Result<(StatusCode, Json<ApiResponse<TicketResponseDto>>)> {
    let ticket = service.create(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(ticket.into()), None, None)),
    ))
}

/// List tickets
///
/// Administrators receive every ticket, users only the ones they filed.
#[utoipa::path(
    get,
    path = "/api/tickets",
    responses(
        (status = 200, description = "Tickets, newest first", body = ApiResponse<Vec<TicketResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn list_tickets(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
) -> Result<Json<ApiResponse<Vec<TicketResponseDto>>>> {
    let tickets: Vec<TicketResponseDto> = service
        .list(&user)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let meta = Meta::with_status_counts(status_counts(&tickets));
    Ok(Json(ApiResponse::success(Some(tickets), None, Some(meta))))
}

fn status_counts(tickets: &[TicketResponseDto]) -> StatusCounts {
    tickets
        .iter()
        .fold(StatusCounts::default(), |mut counts, ticket| {
            match ticket.status {
                TicketStatus::Pending => counts.pending += 1,
                TicketStatus::InProgress => counts.in_progress += 1,
                TicketStatus::Finished => counts.finished += 1,
            }
            counts
        })
}

/// Sectors and problem types accepted when filing a ticket
#[utoipa::path(
    get,
    path = "/api/tickets/catalog",
    responses(
        (status = 200, description = "Ticket catalog", body = ApiResponse<TicketCatalogDto>)
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn get_catalog(
    _user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
) -> Result<Json<ApiResponse<TicketCatalogDto>>> {
    let catalog = TicketCatalogDto::from(service.catalog());
    Ok(Json(ApiResponse::success(Some(catalog), None, None)))
}

/// Get ticket by ID
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket found", body = ApiResponse<TicketResponseDto>),
        (status = 403, description = "Not the ticket owner"),
        (status = 404, description = "Ticket not found")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn get_ticket(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TicketResponseDto>>> {
    let ticket = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(ticket.into()), None, None)))
}

/// Start servicing a ticket (admin)
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket in progress", body = ApiResponse<TicketResponseDto>),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Ticket already finished")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn start_service(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TicketResponseDto>>> {
    let ticket = service.start_service(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(ticket.into()),
        Some("Service started".to_string()),
        None,
    )))
}

/// Finish a ticket with its solution (admin)
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/finish",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    request_body = FinishTicketDto,
    responses(
        (status = 200, description = "Ticket finished", body = ApiResponse<TicketResponseDto>),
        (status = 400, description = "Solution missing"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Ticket not in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn finish_service(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<FinishTicketDto>,
) -> Result<Json<ApiResponse<TicketResponseDto>>> {
    let ticket = service.finish_service(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(ticket.into()),
        Some("Service finished".to_string()),
        None,
    )))
}

/// Update status, urgency or cost (admin)
#[utoipa::path(
    patch,
    path = "/api/tickets/{id}",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    request_body = UpdateTicketDto,
    responses(
        (status = 200, description = "Ticket updated", body = ApiResponse<TicketResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Status cannot move backwards")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn update_ticket(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateTicketDto>,
) -> Result<Json<ApiResponse<TicketResponseDto>>> {
    let ticket = service.update(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(Some(ticket.into()), None, None)))
}

/// Rate a finished ticket (ticket owner, once)
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/feedback",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    request_body = SubmitFeedbackDto,
    responses(
        (status = 200, description = "Feedback recorded", body = ApiResponse<TicketResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not the ticket owner"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Ticket not finished or already rated")
    ),
    security(("bearer_auth" = [])),
    tag = "tickets"
)]
pub async fn submit_feedback(
    user: AuthenticatedUser,
    State(service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<SubmitFeedbackDto>,
) -> Result<Json<ApiResponse<TicketResponseDto>>> {
    let ticket = service.submit_feedback(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(ticket.into()),
        Some("Thank you for your feedback".to_string()),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TicketCatalogConfig;
    use crate::features::tickets::routes::routes;
    use crate::features::tickets::store::InMemoryTicketStore;
    use crate::shared::test_helpers::{create_admin_user, create_regular_user, with_user};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    struct Servers {
        admin: TestServer,
        owner: TestServer,
        stranger: TestServer,
    }

    fn servers() -> Servers {
        let service = Arc::new(TicketService::new(
            Arc::new(InMemoryTicketStore::new()),
            TicketCatalogConfig::default(),
        ));
        let server_for = |user: AuthenticatedUser| {
            TestServer::new(with_user(routes(service.clone()), user)).unwrap()
        };
        Servers {
            admin: server_for(create_admin_user()),
            owner: server_for(create_regular_user("owner")),
            stranger: server_for(create_regular_user("stranger")),
        }
    }

    async fn file_ticket(server: &TestServer) -> String {
        let response = server
            .post("/api/tickets")
            .json(&json!({
                "sector": "Financeiro",
                "problem_type": "Rede",
                "description": "VPN drops every few minutes",
                "urgency": "urgent"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_ticket_returns_envelope() {
        let servers = servers();
        let response = servers
            .owner
            .post("/api/tickets")
            .json(&json!({
                "sector": "Financeiro",
                "problem_type": "Rede",
                "description": "VPN drops every few minutes"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["urgency"], "moderate");
        assert_eq!(body["data"]["user_id"], "owner");
        assert_eq!(body["data"]["history"][0]["type"], "creation");
        assert_eq!(body["data"]["history"][0]["description"], "Ticket created");
    }

    #[tokio::test]
    async fn test_create_ticket_rejects_bad_input() {
        let servers = servers();

        let blank = servers
            .owner
            .post("/api/tickets")
            .json(&json!({ "sector": "RH", "problem_type": "Rede", "description": "" }))
            .await;
        blank.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = blank.json();
        assert_eq!(body["success"], false);

        let malformed = servers
            .owner
            .post("/api/tickets")
            .json(&json!({ "sector": "RH" }))
            .await;
        malformed.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_http() {
        let servers = servers();
        let id = file_ticket(&servers.owner).await;

        servers
            .admin
            .post(&format!("/api/tickets/{}/start", id))
            .await
            .assert_status_ok();

        servers
            .admin
            .patch(&format!("/api/tickets/{}", id))
            .json(&json!({ "cost": 250.5 }))
            .await
            .assert_status_ok();

        let finished = servers
            .admin
            .post(&format!("/api/tickets/{}/finish", id))
            .json(&json!({ "solution": "Updated the VPN client" }))
            .await;
        finished.assert_status_ok();
        let body: Value = finished.json();
        assert_eq!(body["data"]["status"], "finished");
        assert_eq!(body["data"]["cost"], 250.5);

        let rated = servers
            .owner
            .post(&format!("/api/tickets/{}/feedback", id))
            .json(&json!({ "feedback": "Works again", "rating": 9 }))
            .await;
        rated.assert_status_ok();
        let body: Value = rated.json();
        assert_eq!(body["data"]["rating"], 9);
        let history = body["data"]["history"].as_array().unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(
            history[4]["description"],
            "User submitted feedback with rating 9/10"
        );

        servers
            .owner
            .post(&format!("/api/tickets/{}/feedback", id))
            .json(&json!({ "feedback": "Again", "rating": 3 }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_role_and_ownership_checks() {
        let servers = servers();
        let id = file_ticket(&servers.owner).await;

        servers
            .owner
            .post(&format!("/api/tickets/{}/start", id))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        servers
            .stranger
            .get(&format!("/api/tickets/{}", id))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        servers
            .owner
            .get(&format!("/api/tickets/{}", id))
            .await
            .assert_status_ok();

        let mine: Value = servers.stranger.get("/api/tickets").await.json();
        assert_eq!(mine["data"].as_array().unwrap().len(), 0);
        let all: Value = servers.admin.get("/api/tickets").await.json();
        assert_eq!(all["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_list_meta_counts_tickets_by_status() {
        let servers = servers();
        let started = file_ticket(&servers.owner).await;
        file_ticket(&servers.owner).await;
        servers
            .admin
            .post(&format!("/api/tickets/{}/start", started))
            .await
            .assert_status_ok();

        let all: Value = servers.admin.get("/api/tickets").await.json();
        assert_eq!(
            all["meta"],
            json!({
                "total": 2,
                "by_status": { "pending": 1, "in_progress": 1, "finished": 0 }
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_ticket_and_finish_conflict() {
        let servers = servers();
        servers
            .admin
            .get(&format!("/api/tickets/{}", Uuid::now_v7()))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let id = file_ticket(&servers.owner).await;
        servers
            .admin
            .post(&format!("/api/tickets/{}/finish", id))
            .json(&json!({ "solution": "Nothing to do" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_catalog_lists_defaults() {
        let servers = servers();
        let body: Value = servers.owner.get("/api/tickets/catalog").await.json();
        let sectors = body["data"]["sectors"].as_array().unwrap();
        assert!(sectors.iter().any(|s| s == "RH"));
        assert!(body["data"]["problem_types"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "Impressora"));
    }
}
