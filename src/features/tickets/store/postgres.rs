use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{MutationOutcome, StoreError, StoreResult, TicketStore};
use crate::features::tickets::models::{
    HistoryEntry, HistoryRecord, MutationGuard, Ticket, TicketChanges, TicketRecord,
};

const TICKET_COLUMNS: &str = r#"
    id, user_id, user_name, sector, problem_type, description,
    urgency, status, solution, cost, start_time, end_time,
    feedback, rating, created_at, updated_at
"#;

const HISTORY_COLUMNS: &str = r#"
    ticket_id, position, entry_type, description,
    solution, feedback, rating, created_at
"#;

/// PostgreSQL-backed ticket store.
///
/// Ticket rows live in `tickets`, audit entries in `ticket_history`. Every
/// write that touches both tables runs in a single transaction.
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        record: &HistoryRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO ticket_history (
                ticket_id, position, entry_type, description,
                solution, feedback, rating, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.ticket_id)
        .bind(record.position)
        .bind(record.entry_type)
        .bind(&record.description)
        .bind(&record.solution)
        .bind(&record.feedback)
        .bind(record.rating)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Load history for the given tickets and stitch them back together,
    /// keeping the order of `records`
    async fn assemble(&self, records: Vec<TicketRecord>) -> StoreResult<Vec<Ticket>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let sql = format!(
            "SELECT {} FROM ticket_history WHERE ticket_id = ANY($1) ORDER BY ticket_id, position",
            HISTORY_COLUMNS
        );
        let rows = sqlx::query_as::<_, HistoryRecord>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load ticket history: {:?}", e);
                StoreError::Database(e)
            })?;

        let mut by_ticket: HashMap<Uuid, Vec<HistoryRecord>> = HashMap::new();
        for row in rows {
            by_ticket.entry(row.ticket_id).or_default().push(row);
        }

        records
            .into_iter()
            .map(|record| {
                let history = by_ticket.remove(&record.id).unwrap_or_default();
                Self::build(record, history)
            })
            .collect()
    }

    fn build(record: TicketRecord, history: Vec<HistoryRecord>) -> StoreResult<Ticket> {
        if history.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "ticket {} has no history entries",
                record.id
            )));
        }
        Ok(Ticket::from_records(record, history))
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn insert(&self, ticket: &Ticket) -> StoreResult<()> {
        let (record, history) = ticket.clone().into_records();
        if history.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "ticket {} has no history",
                record.id
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, user_id, user_name, sector, problem_type, description,
                urgency, status, solution, cost, start_time, end_time,
                feedback, rating, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(&record.user_name)
        .bind(&record.sector)
        .bind(&record.problem_type)
        .bind(&record.description)
        .bind(record.urgency)
        .bind(record.status)
        .bind(&record.solution)
        .bind(record.cost)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(&record.feedback)
        .bind(record.rating)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert ticket {}: {:?}", record.id, e);
            StoreError::Database(e)
        })?;

        for entry in &history {
            Self::insert_history(&mut tx, entry).await.map_err(|e| {
                tracing::error!(
                    "Failed to insert history for new ticket {}, rolling back: {:?}",
                    record.id,
                    e
                );
                StoreError::Database(e)
            })?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit new ticket {}: {:?}", record.id, e);
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        let record = sqlx::query_as::<_, TicketRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get ticket by ID: {:?}", e);
                StoreError::Database(e)
            })?;

        match record {
            Some(record) => Ok(self.assemble(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets ORDER BY created_at DESC, id DESC",
            TICKET_COLUMNS
        );
        let records = sqlx::query_as::<_, TicketRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list tickets: {:?}", e);
                StoreError::Database(e)
            })?;

        self.assemble(records).await
    }

    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            TICKET_COLUMNS
        );
        let records = sqlx::query_as::<_, TicketRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list tickets by user: {:?}", e);
                StoreError::Database(e)
            })?;

        self.assemble(records).await
    }

    async fn apply_mutation(
        &self,
        id: Uuid,
        changes: &TicketChanges,
        entry: &HistoryEntry,
    ) -> StoreResult<MutationOutcome> {
        let mut tx = self.pool.begin().await?;

        // The guard is evaluated against the row this UPDATE locks, and the
        // lock also serializes history appends for the ticket until commit.
        let sql = format!(
            r#"
            UPDATE tickets
            SET
                status = COALESCE($2, status),
                urgency = COALESCE($3, urgency),
                cost = COALESCE($4, cost),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                solution = COALESCE($7, solution),
                feedback = COALESCE($8, feedback),
                rating = COALESCE($9, rating),
                updated_at = $10
            WHERE id = $1 AND {}
            RETURNING {}
            "#,
            guard_condition(changes.guard),
            TICKET_COLUMNS
        );
        let mut query = sqlx::query_as::<_, TicketRecord>(&sql)
            .bind(id)
            .bind(changes.status)
            .bind(changes.urgency)
            .bind(changes.cost)
            .bind(changes.start_time)
            .bind(changes.end_time)
            .bind(&changes.solution)
            .bind(&changes.feedback)
            .bind(changes.rating)
            .bind(changes.updated_at);
        if let MutationGuard::StatusAtMost(status) = changes.guard {
            query = query.bind(status);
        }
        let record = query.fetch_optional(&mut *tx).await.map_err(|e| {
            tracing::error!("Failed to update ticket {}: {:?}", id, e);
            StoreError::Database(e)
        })?;

        let Some(record) = record else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to check ticket {} existence: {:?}", id, e);
                        StoreError::Database(e)
                    })?;
            return Ok(if exists {
                tracing::debug!("Guard {:?} failed for ticket {}", changes.guard, id);
                MutationOutcome::GuardFailed
            } else {
                MutationOutcome::NotFound
            });
        };

        let position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM ticket_history WHERE ticket_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read history position of ticket {}: {:?}", id, e);
            StoreError::Database(e)
        })?;

        let history_record = HistoryRecord::from_entry(id, position, entry.clone());
        Self::insert_history(&mut tx, &history_record)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to append history to ticket {}, update rolled back: {:?}",
                    id,
                    e
                );
                StoreError::Database(e)
            })?;

        let sql = format!(
            "SELECT {} FROM ticket_history WHERE ticket_id = $1 ORDER BY position",
            HISTORY_COLUMNS
        );
        let history = sqlx::query_as::<_, HistoryRecord>(&sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to reload history of ticket {}: {:?}", id, e);
                StoreError::Database(e)
            })?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit mutation of ticket {}: {:?}", id, e);
            StoreError::Database(e)
        })?;

        Self::build(record, history).map(MutationOutcome::Applied)
    }
}

/// SQL predicate over the `tickets` row matching [`MutationGuard::holds`].
/// `StatusAtMost` reads its status from `$11`; `ticket_status` values order
/// as declared.
fn guard_condition(guard: MutationGuard) -> &'static str {
    match guard {
        MutationGuard::Always => "TRUE",
        MutationGuard::NotStarted => "start_time IS NULL AND status <> 'finished'",
        MutationGuard::InProgress => "status = 'in_progress'",
        MutationGuard::AwaitingFeedback => {
            "status = 'finished' AND feedback IS NULL AND rating IS NULL"
        }
        MutationGuard::StatusAtMost(_) => "status <= $11",
    }
}

/// Run against a scratch database with
/// `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::run_migrations;
    use crate::features::tickets::models::{NewTicket, TicketStatus, TicketUrgency};
    use chrono::{SubsecRound, Utc};
    use fake::faker::lorem::en::Sentence;
    use fake::Fake;
    use rust_decimal::Decimal;

    async fn store() -> PgTicketStore {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        PgTicketStore::new(pool)
    }

    fn ticket() -> Ticket {
        Ticket::open(
            NewTicket {
                user_id: format!("user-{}", Uuid::now_v7()),
                user_name: "Pg User".to_string(),
                sector: "Engenharia".to_string(),
                problem_type: "Hardware".to_string(),
                description: Sentence(3..8).fake(),
                urgency: TicketUrgency::Urgent,
            },
            Utc::now().trunc_subsecs(6),
        )
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at TEST_DATABASE_URL"]
    async fn test_ticket_reads_back_equal_to_written() {
        let store = store().await;
        let ticket = ticket();
        store.insert(&ticket).await.unwrap();

        assert_eq!(store.get(ticket.id).await.unwrap(), Some(ticket.clone()));

        let now = Utc::now().trunc_subsecs(6);
        let changes = TicketChanges {
            cost: Some(Decimal::new(999_999_999_999, 2)),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::status_change(now, ticket.status);
        let MutationOutcome::Applied(costed) =
            store.apply_mutation(ticket.id, &changes, &entry).await.unwrap()
        else {
            panic!("cost update was not applied");
        };
        assert_eq!(store.get(ticket.id).await.unwrap(), Some(costed));
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at TEST_DATABASE_URL"]
    async fn test_failed_guard_leaves_row_and_history_untouched() {
        let store = store().await;
        let ticket = ticket();
        store.insert(&ticket).await.unwrap();

        let now = Utc::now().trunc_subsecs(6);
        let start = TicketChanges {
            guard: MutationGuard::NotStarted,
            status: Some(TicketStatus::InProgress),
            start_time: Some(now),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::status_change(now, TicketStatus::InProgress);

        assert!(matches!(
            store.apply_mutation(ticket.id, &start, &entry).await.unwrap(),
            MutationOutcome::Applied(_)
        ));
        assert_eq!(
            store.apply_mutation(ticket.id, &start, &entry).await.unwrap(),
            MutationOutcome::GuardFailed
        );

        let feedback = TicketChanges {
            guard: MutationGuard::AwaitingFeedback,
            feedback: Some("Too early".to_string()),
            rating: Some(3),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::feedback(now, "Too early".to_string(), 3);
        assert_eq!(
            store.apply_mutation(ticket.id, &feedback, &entry).await.unwrap(),
            MutationOutcome::GuardFailed
        );
        assert_eq!(
            store
                .apply_mutation(Uuid::now_v7(), &feedback, &entry)
                .await
                .unwrap(),
            MutationOutcome::NotFound
        );

        let stored = store.get(ticket.id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.start_time, Some(now));
        assert!(stored.feedback.is_none());
    }
}
