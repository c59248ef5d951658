use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use super::history::{HistoryEntry, HistoryRecord};

/// Ticket status enum matching database enum.
///
/// Variants are declared in lifecycle order; a ticket may only move to a
/// later variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Finished,
}

impl TicketStatus {
    /// Human-readable label used in history descriptions
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "Pending",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Finished => "Finished",
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle forward-only.
    /// Staying on the same status counts as forward.
    pub fn can_advance_to(&self, next: TicketStatus) -> bool {
        next >= *self
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Pending => write!(f, "pending"),
            TicketStatus::InProgress => write!(f, "in_progress"),
            TicketStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Ticket urgency enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "ticket_urgency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketUrgency {
    Urgent,
    Medium,
    #[default]
    Moderate,
}

impl std::fmt::Display for TicketUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketUrgency::Urgent => write!(f, "urgent"),
            TicketUrgency::Medium => write!(f, "medium"),
            TicketUrgency::Moderate => write!(f, "moderate"),
        }
    }
}

/// A reported problem together with its audit history (oldest entry first)
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
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
    pub cost: Option<Decimal>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub history: Vec<HistoryEntry>,
}

/// Data for filing a new ticket
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: String,
    pub user_name: String,
    pub sector: String,
    pub problem_type: String,
    pub description: String,
    pub urgency: TicketUrgency,
}

impl Ticket {
    /// Build a pending ticket whose history starts with its creation entry
    pub fn open(data: NewTicket, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            user_name: data.user_name,
            sector: data.sector,
            problem_type: data.problem_type,
            description: data.description,
            urgency: data.urgency,
            status: TicketStatus::Pending,
            created_at: now,
            updated_at: now,
            start_time: None,
            end_time: None,
            solution: None,
            cost: None,
            feedback: None,
            rating: None,
            history: vec![HistoryEntry::creation(now)],
        }
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some() || self.rating.is_some()
    }

    /// Hours between start and end of service, when both are known
    pub fn resolution_hours(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / (1000.0 * 60.0 * 60.0))
            }
            _ => None,
        }
    }

    /// Split into the flat rows persisted in `tickets` and `ticket_history`
    pub fn into_records(self) -> (TicketRecord, Vec<HistoryRecord>) {
        let history = self
            .history
            .into_iter()
            .enumerate()
            .map(|(position, entry)| HistoryRecord::from_entry(self.id, position as i32, entry))
            .collect();

        let record = TicketRecord {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            sector: self.sector,
            problem_type: self.problem_type,
            description: self.description,
            urgency: self.urgency,
            status: self.status,
            solution: self.solution,
            cost: self.cost,
            start_time: self.start_time,
            end_time: self.end_time,
            feedback: self.feedback,
            rating: self.rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        (record, history)
    }

    /// Reassemble a ticket from its rows. History rows may arrive unordered.
    pub fn from_records(record: TicketRecord, mut history: Vec<HistoryRecord>) -> Self {
        history.sort_by_key(|h| h.position);

        Self {
            id: record.id,
            user_id: record.user_id,
            user_name: record.user_name,
            sector: record.sector,
            problem_type: record.problem_type,
            description: record.description,
            urgency: record.urgency,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            start_time: record.start_time,
            end_time: record.end_time,
            solution: record.solution,
            cost: record.cost,
            feedback: record.feedback,
            rating: record.rating,
            history: history.into_iter().map(HistoryEntry::from).collect(),
        }
    }
}

/// Database model for ticket
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TicketRecord {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub sector: String,
    pub problem_type: String,
    pub description: String,
    pub urgency: TicketUrgency,
    pub status: TicketStatus,
    pub solution: Option<String>,
    pub cost: Option<Decimal>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// State the stored ticket must still be in when a mutation is applied.
///
/// Stores check the guard inside the same atomic section as the write, so a
/// decision taken on an earlier read cannot be applied twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationGuard {
    Always,
    /// Service not started yet and ticket not finished
    NotStarted,
    InProgress,
    /// Finished and not rated yet
    AwaitingFeedback,
    /// Status not past the given one
    StatusAtMost(TicketStatus),
}

impl MutationGuard {
    pub fn holds(&self, ticket: &Ticket) -> bool {
        match self {
            MutationGuard::Always => true,
            MutationGuard::NotStarted => {
                !ticket.is_started() && ticket.status != TicketStatus::Finished
            }
            MutationGuard::InProgress => ticket.status == TicketStatus::InProgress,
            MutationGuard::AwaitingFeedback => {
                ticket.status == TicketStatus::Finished && !ticket.has_feedback()
            }
            MutationGuard::StatusAtMost(status) => ticket.status <= *status,
        }
    }
}

/// Field changes applied by one lifecycle mutation.
///
/// `None` leaves the stored value untouched; `updated_at` is always written.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketChanges {
    pub guard: MutationGuard,
    pub status: Option<TicketStatus>,
    pub urgency: Option<TicketUrgency>,
    pub cost: Option<Decimal>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub solution: Option<String>,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub updated_at: DateTime<Utc>,
}

impl TicketChanges {
    /// An empty change set stamped at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            guard: MutationGuard::Always,
            status: None,
            urgency: None,
            cost: None,
            start_time: None,
            end_time: None,
            solution: None,
            feedback: None,
            rating: None,
            updated_at: now,
        }
    }

    /// Merge the changes into `ticket` and append `entry` to its history
    pub fn apply_to(&self, ticket: &mut Ticket, entry: HistoryEntry) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(urgency) = self.urgency {
            ticket.urgency = urgency;
        }
        if let Some(cost) = self.cost {
            ticket.cost = Some(cost);
        }
        if let Some(start_time) = self.start_time {
            ticket.start_time = Some(start_time);
        }
        if let Some(end_time) = self.end_time {
            ticket.end_time = Some(end_time);
        }
        if let Some(solution) = &self.solution {
            ticket.solution = Some(solution.clone());
        }
        if let Some(feedback) = &self.feedback {
            ticket.feedback = Some(feedback.clone());
        }
        if let Some(rating) = self.rating {
            ticket.rating = Some(rating);
        }
        ticket.updated_at = self.updated_at;
        ticket.history.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tickets::models::HistoryEntryType;
    use chrono::{Duration, TimeZone};
    use fake::faker::lorem::en::Sentence;
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn new_ticket() -> NewTicket {
        NewTicket {
            user_id: "user-1".to_string(),
            user_name: Name().fake(),
            sector: "RH".to_string(),
            problem_type: "Impressora".to_string(),
            description: Sentence(3..8).fake(),
            urgency: TicketUrgency::Urgent,
        }
    }

    #[test]
    fn test_open_starts_pending_with_creation_entry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let ticket = Ticket::open(new_ticket(), now);

        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.created_at, now);
        assert_eq!(ticket.updated_at, now);
        assert_eq!(ticket.history.len(), 1);
        assert_eq!(ticket.history[0].entry_type, HistoryEntryType::Creation);
    }

    #[test]
    fn test_status_only_advances() {
        assert!(TicketStatus::Pending.can_advance_to(TicketStatus::InProgress));
        assert!(TicketStatus::InProgress.can_advance_to(TicketStatus::Finished));
        assert!(TicketStatus::InProgress.can_advance_to(TicketStatus::InProgress));
        assert!(!TicketStatus::Finished.can_advance_to(TicketStatus::Pending));
        assert!(!TicketStatus::InProgress.can_advance_to(TicketStatus::Pending));
    }

    #[test]
    fn test_mutation_guards_follow_lifecycle() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut ticket = Ticket::open(new_ticket(), now);
        assert!(MutationGuard::NotStarted.holds(&ticket));
        assert!(!MutationGuard::InProgress.holds(&ticket));
        assert!(MutationGuard::StatusAtMost(TicketStatus::Pending).holds(&ticket));

        TicketChanges {
            status: Some(TicketStatus::InProgress),
            start_time: Some(now),
            ..TicketChanges::at(now)
        }
        .apply_to(
            &mut ticket,
            HistoryEntry::status_change(now, TicketStatus::InProgress),
        );
        assert!(!MutationGuard::NotStarted.holds(&ticket));
        assert!(MutationGuard::InProgress.holds(&ticket));
        assert!(!MutationGuard::StatusAtMost(TicketStatus::Pending).holds(&ticket));
        assert!(!MutationGuard::AwaitingFeedback.holds(&ticket));

        ticket.status = TicketStatus::Finished;
        assert!(MutationGuard::AwaitingFeedback.holds(&ticket));
        ticket.rating = Some(5);
        assert!(!MutationGuard::AwaitingFeedback.holds(&ticket));
        assert!(MutationGuard::Always.holds(&ticket));
    }

    #[test]
    fn test_records_round_trip_preserves_every_field() {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let started = created + Duration::hours(1);
        let finished = started + Duration::hours(3);
        let rated = finished + Duration::minutes(20);

        let mut ticket = Ticket::open(new_ticket(), created);
        TicketChanges {
            status: Some(TicketStatus::InProgress),
            start_time: Some(started),
            ..TicketChanges::at(started)
        }
        .apply_to(
            &mut ticket,
            HistoryEntry::status_change(started, TicketStatus::InProgress),
        );
        TicketChanges {
            status: Some(TicketStatus::Finished),
            end_time: Some(finished),
            solution: Some("Replaced toner".to_string()),
            cost: Some(Decimal::new(12550, 2)),
            ..TicketChanges::at(finished)
        }
        .apply_to(
            &mut ticket,
            HistoryEntry::solution(finished, "Replaced toner".to_string()),
        );
        TicketChanges {
            feedback: Some("Quick fix".to_string()),
            rating: Some(9),
            ..TicketChanges::at(rated)
        }
        .apply_to(
            &mut ticket,
            HistoryEntry::feedback(rated, "Quick fix".to_string(), 9),
        );

        let (record, mut history) = ticket.clone().into_records();
        assert_eq!(history.len(), 4);
        assert_eq!(record.status, TicketStatus::Finished);

        // Rows come back from the database in arbitrary order
        history.reverse();
        let restored = Ticket::from_records(record, history);

        assert_eq!(restored, ticket);
        let types: Vec<_> = restored.history.iter().map(|h| h.entry_type).collect();
        assert_eq!(
            types,
            vec![
                HistoryEntryType::Creation,
                HistoryEntryType::StatusChange,
                HistoryEntryType::Solution,
                HistoryEntryType::Feedback,
            ]
        );
    }

    #[test]
    fn test_resolution_hours() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut ticket = Ticket::open(new_ticket(), start);
        assert_eq!(ticket.resolution_hours(), None);

        ticket.start_time = Some(start);
        ticket.end_time = Some(start + Duration::minutes(90));
        assert_eq!(ticket.resolution_hours(), Some(1.5));
    }
}
