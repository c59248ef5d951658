use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::TicketCatalogConfig;
use crate::features::tickets::models::{
    HistoryEntry, HistoryEntryType, Ticket, TicketStatus, TicketUrgency,
};

/// Request DTO for filing a ticket
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTicketDto {
    #[validate(length(min = 1, max = 100, message = "Sector is required"))]
    pub sector: String,

    #[validate(length(min = 1, max = 100, message = "Problem type is required"))]
    pub problem_type: String,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be 1-5000 characters"
    ))]
    pub description: String,

    /// Defaults to `moderate`
    #[serde(default)]
    pub urgency: Option<TicketUrgency>,
}

/// Request DTO for closing a ticket with its solution
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FinishTicketDto {
    #[validate(length(min = 1, max = 5000, message = "Solution must be 1-5000 characters"))]
    pub solution: String,
}

/// Request DTO for an administrator's partial update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTicketDto {
    #[serde(default)]
    pub status: Option<TicketStatus>,

    #[serde(default)]
    pub urgency: Option<TicketUrgency>,

    /// Stored as `NUMERIC(12, 2)`
    #[validate(range(
        min = 0.0,
        max = 9999999999.99,
        message = "Cost must be between 0 and 9999999999.99"
    ))]
    #[serde(default)]
    pub cost: Option<f64>,
}

impl UpdateTicketDto {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.urgency.is_none() && self.cost.is_none()
    }
}

/// Request DTO for the filer's satisfaction feedback
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitFeedbackDto {
    #[validate(length(min = 1, max = 2000, message = "Feedback must be 1-2000 characters"))]
    pub feedback: String,

    #[validate(range(min = 1, max = 10, message = "Rating must be between 1 and 10"))]
    pub rating: i16,
}

/// Response DTO for one history entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryDto {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "type")]
    pub entry_type: HistoryEntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i16>,
}

impl From<HistoryEntry> for HistoryEntryDto {
    fn from(h: HistoryEntry) -> Self {
        Self {
            timestamp: h.timestamp,
            description: h.description,
            entry_type: h.entry_type,
            solution: h.solution,
            feedback: h.feedback,
            rating: h.rating,
        }
    }
}

/// Response DTO for ticket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponseDto {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub sector: String,
    pub problem_type: String,
    pub description: String,
    pub urgency: TicketUrgency,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub solution: Option<String>,
    pub cost: Option<f64>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub history: Vec<HistoryEntryDto>,
}

impl From<Ticket> for TicketResponseDto {
    fn from(t: Ticket) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            user_name: t.user_name,
            sector: t.sector,
            problem_type: t.problem_type,
            description: t.description,
            urgency: t.urgency,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
            start_time: t.start_time,
            end_time: t.end_time,
            solution: t.solution,
            cost: t.cost.and_then(|c| c.to_f64()),
            feedback: t.feedback,
            rating: t.rating,
            history: t.history.into_iter().map(Into::into).collect(),
        }
    }
}

/// Sectors and problem types accepted when filing a ticket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketCatalogDto {
    pub sectors: Vec<String>,
    pub problem_types: Vec<String>,
}

impl From<&TicketCatalogConfig> for TicketCatalogDto {
    fn from(c: &TicketCatalogConfig) -> Self {
        Self {
            sectors: c.sectors.clone(),
            problem_types: c.problem_types.clone(),
        }
    }
}
