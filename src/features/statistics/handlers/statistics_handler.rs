use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::extractor::AppQuery;
use crate::features::auth::guards::RequireAdmin;
use crate::features::statistics::dtos::{StatisticsQuery, StatisticsReportDto};
use crate::features::statistics::services::StatisticsService;
use crate::shared::types::ApiResponse;

/// Service statistics over a date range and sector (admin)
#[utoipa::path(
    get,
    path = "/api/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Statistics report", body = ApiResponse<StatisticsReportDto>),
        (status = 400, description = "Invalid date range or slider"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "statistics"
)]
pub async fn get_statistics(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<StatisticsService>>,
    AppQuery(query): AppQuery<StatisticsQuery>,
) -> Result<Json<ApiResponse<StatisticsReportDto>>> {
    let report = service.report(query, Utc::now().date_naive()).await?;
    Ok(Json(ApiResponse::success(Some(report), None, None)))
}
