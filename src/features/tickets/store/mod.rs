//! Ticket persistence port.
//!
//! The lifecycle service talks to storage only through [`TicketStore`].
//! [`PgTicketStore`] backs the deployed service; [`InMemoryTicketStore`]
//! serves tests and the database-less standalone mode.

mod memory;
mod postgres;

pub use memory::InMemoryTicketStore;
pub use postgres::PgTicketStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::features::tickets::models::{HistoryEntry, Ticket, TicketChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data violates an invariant the domain relies on
    #[error("corrupt ticket data: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of [`TicketStore::apply_mutation`]
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Changes and history entry written; carries the updated ticket
    Applied(Ticket),
    /// The ticket no longer satisfies the change set's guard; nothing written
    GuardFailed,
    NotFound,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket together with its initial history as one unit
    async fn insert(&self, ticket: &Ticket) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>>;

    /// All tickets, newest first
    async fn list_all(&self) -> StoreResult<Vec<Ticket>>;

    /// Tickets filed by `user_id`, newest first
    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Ticket>>;

    /// Merge `changes` into the ticket and append `entry` to its history,
    /// provided `changes.guard` holds for the stored ticket.
    ///
    /// The guard check, the field changes and the history entry are one
    /// atomic unit: all take effect or none does.
    async fn apply_mutation(
        &self,
        id: Uuid,
        changes: &TicketChanges,
        entry: &HistoryEntry,
    ) -> StoreResult<MutationOutcome>;
}
