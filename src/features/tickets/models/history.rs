use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ticket::TicketStatus;

/// History entry type enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "history_entry_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntryType {
    Creation,
    StatusChange,
    Solution,
    Feedback,
}

/// One audit record in a ticket's history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub entry_type: HistoryEntryType,
    /// Only set on `Solution` entries
    pub solution: Option<String>,
    /// Only set on `Feedback` entries
    pub feedback: Option<String>,
    pub rating: Option<i16>,
}

impl HistoryEntry {
    fn bare(timestamp: DateTime<Utc>, entry_type: HistoryEntryType, description: String) -> Self {
        Self {
            timestamp,
            description,
            entry_type,
            solution: None,
            feedback: None,
            rating: None,
        }
    }

    pub fn creation(timestamp: DateTime<Utc>) -> Self {
        Self::bare(
            timestamp,
            HistoryEntryType::Creation,
            "Ticket created".to_string(),
        )
    }

    pub fn status_change(timestamp: DateTime<Utc>, status: TicketStatus) -> Self {
        Self::bare(
            timestamp,
            HistoryEntryType::StatusChange,
            format!("Status updated to: {}", status.label()),
        )
    }

    pub fn solution(timestamp: DateTime<Utc>, solution: String) -> Self {
        Self {
            solution: Some(solution),
            ..Self::bare(
                timestamp,
                HistoryEntryType::Solution,
                "Ticket finished with solution".to_string(),
            )
        }
    }

    pub fn feedback(timestamp: DateTime<Utc>, feedback: String, rating: i16) -> Self {
        Self {
            feedback: Some(feedback),
            rating: Some(rating),
            ..Self::bare(
                timestamp,
                HistoryEntryType::Feedback,
                format!("User submitted feedback with rating {}/10", rating),
            )
        }
    }
}

/// Database model for a `ticket_history` row.
///
/// `position` is the zero-based index of the entry in the ticket's history.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct HistoryRecord {
    pub ticket_id: Uuid,
    pub position: i32,
    pub entry_type: HistoryEntryType,
    pub description: String,
    pub solution: Option<String>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn from_entry(ticket_id: Uuid, position: i32, entry: HistoryEntry) -> Self {
        Self {
            ticket_id,
            position,
            entry_type: entry.entry_type,
            description: entry.description,
            solution: entry.solution,
            feedback: entry.feedback,
            rating: entry.rating,
            created_at: entry.timestamp,
        }
    }
}

impl From<HistoryRecord> for HistoryEntry {
    fn from(r: HistoryRecord) -> Self {
        Self {
            timestamp: r.created_at,
            description: r.description,
            entry_type: r.entry_type,
            solution: r.solution,
            feedback: r.feedback,
            rating: r.rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_only_on_matching_type() {
        let now = Utc::now();

        let status = HistoryEntry::status_change(now, TicketStatus::InProgress);
        assert_eq!(status.description, "Status updated to: In Progress");
        assert!(status.solution.is_none() && status.feedback.is_none() && status.rating.is_none());

        let solution = HistoryEntry::solution(now, "Rebooted router".to_string());
        assert_eq!(solution.solution.as_deref(), Some("Rebooted router"));
        assert!(solution.feedback.is_none() && solution.rating.is_none());

        let feedback = HistoryEntry::feedback(now, "Great".to_string(), 7);
        assert_eq!(feedback.rating, Some(7));
        assert_eq!(
            feedback.description,
            "User submitted feedback with rating 7/10"
        );
        assert!(feedback.solution.is_none());
    }
}
