use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MutationOutcome, StoreError, StoreResult, TicketStore};
use crate::features::tickets::models::{HistoryEntry, Ticket, TicketChanges};

/// Ticket store kept in process memory
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<Uuid, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
        tickets.sort_by_key(|t| Reverse((t.created_at, t.id)));
        tickets
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn insert(&self, ticket: &Ticket) -> StoreResult<()> {
        if ticket.history.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "ticket {} has no history",
                ticket.id
            )));
        }

        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::Corrupt(format!(
                "ticket {} already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<Ticket>> {
        let tickets = self.tickets.read().await.values().cloned().collect();
        Ok(Self::newest_first(tickets))
    }

    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Ticket>> {
        let tickets = self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(tickets))
    }

    async fn apply_mutation(
        &self,
        id: Uuid,
        changes: &TicketChanges,
        entry: &HistoryEntry,
    ) -> StoreResult<MutationOutcome> {
        let mut tickets = self.tickets.write().await;
        let Some(ticket) = tickets.get_mut(&id) else {
            return Ok(MutationOutcome::NotFound);
        };
        if !changes.guard.holds(ticket) {
            return Ok(MutationOutcome::GuardFailed);
        }
        changes.apply_to(ticket, entry.clone());
        Ok(MutationOutcome::Applied(ticket.clone()))
    }
}
