use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::TicketCatalogConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::tickets::dtos::{
    CreateTicketDto, FinishTicketDto, SubmitFeedbackDto, UpdateTicketDto,
};
use crate::features::tickets::models::{
    HistoryEntry, MutationGuard, NewTicket, Ticket, TicketChanges, TicketStatus,
};
use crate::features::tickets::policy::{authorize, TicketOperation};
use crate::features::tickets::store::{MutationOutcome, TicketStore};

/// Ticket lifecycle: filing, service start/finish, admin edits and feedback.
///
/// Every mutation is authorized against the acting user, validated, checked
/// against the forward-only status machine and then written through a single
/// [`TicketStore::apply_mutation`] call, so the field changes and their
/// history entry land together. The state the decision was taken on travels
/// with the write as a [`MutationGuard`]; when a concurrent request got there
/// first the guard fails and the operation reports a conflict instead of
/// writing twice.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    catalog: TicketCatalogConfig,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>, catalog: TicketCatalogConfig) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &TicketCatalogConfig {
        &self.catalog
    }

    async fn load(&self, id: Uuid) -> Result<Ticket> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' not found", id)))
    }

    /// `None` when the stored ticket no longer satisfies `changes.guard`
    async fn apply(
        &self,
        id: Uuid,
        changes: TicketChanges,
        entry: HistoryEntry,
    ) -> Result<Option<Ticket>> {
        match self.store.apply_mutation(id, &changes, &entry).await? {
            MutationOutcome::Applied(ticket) => Ok(Some(ticket)),
            MutationOutcome::GuardFailed => {
                tracing::warn!(
                    "Ticket {} changed concurrently, guard {:?} no longer holds",
                    id,
                    changes.guard
                );
                Ok(None)
            }
            MutationOutcome::NotFound => {
                Err(AppError::NotFound(format!("Ticket '{}' not found", id)))
            }
        }
    }

    /// File a new ticket on behalf of `actor`
    pub async fn create(&self, actor: &AuthenticatedUser, dto: CreateTicketDto) -> Result<Ticket> {
        authorize(actor, TicketOperation::Create, None)?;
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let sector = required_text("Sector", &dto.sector)?;
        let problem_type = required_text("Problem type", &dto.problem_type)?;
        let description = required_text("Description", &dto.description)?;

        if !self.catalog.has_sector(&sector) {
            return Err(AppError::Validation(format!("Unknown sector '{}'", sector)));
        }
        if !self.catalog.has_problem_type(&problem_type) {
            return Err(AppError::Validation(format!(
                "Unknown problem type '{}'",
                problem_type
            )));
        }

        let ticket = Ticket::open(
            NewTicket {
                user_id: actor.sub.clone(),
                user_name: actor.name.clone(),
                sector,
                problem_type,
                description,
                urgency: dto.urgency.unwrap_or_default(),
            },
            timestamp_now(),
        );

        self.store.insert(&ticket).await?;

        tracing::info!(
            "Ticket created: id={}, sector={}, urgency={}, user={}",
            ticket.id,
            ticket.sector,
            ticket.urgency,
            actor.sub
        );

        Ok(ticket)
    }

    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Ticket> {
        let ticket = self.load(id).await?;
        authorize(actor, TicketOperation::View, Some(&ticket))?;
        Ok(ticket)
    }

    /// Admins see every ticket, users only their own; newest first
    pub async fn list(&self, actor: &AuthenticatedUser) -> Result<Vec<Ticket>> {
        if actor.is_admin() {
            authorize(actor, TicketOperation::ListAll, None)?;
            Ok(self.store.list_all().await?)
        } else {
            Ok(self.store.list_by_user(&actor.sub).await?)
        }
    }

    /// Move a ticket into service. Starting an already-started ticket returns
    /// it unchanged.
    pub async fn start_service(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Ticket> {
        let ticket = self.load(id).await?;
        authorize(actor, TicketOperation::Start, Some(&ticket))?;

        if ticket.is_started() {
            tracing::debug!("Ticket {} already started, nothing to do", id);
            return Ok(ticket);
        }
        if ticket.status == TicketStatus::Finished {
            return Err(AppError::Conflict(format!(
                "Ticket '{}' is already finished",
                id
            )));
        }

        let now = timestamp_now();
        let changes = TicketChanges {
            guard: MutationGuard::NotStarted,
            status: Some(TicketStatus::InProgress),
            start_time: Some(now),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::status_change(now, TicketStatus::InProgress);

        match self.apply(id, changes, entry).await? {
            Some(ticket) => {
                tracing::info!("Ticket started: id={}, by={}", id, actor.sub);
                Ok(ticket)
            }
            None => {
                let current = self.load(id).await?;
                if current.is_started() {
                    tracing::debug!("Ticket {} started concurrently, nothing to do", id);
                    Ok(current)
                } else {
                    Err(AppError::Conflict(format!(
                        "Ticket '{}' is already finished",
                        id
                    )))
                }
            }
        }
    }

    /// Close a ticket in service with the applied solution
    pub async fn finish_service(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: FinishTicketDto,
    ) -> Result<Ticket> {
        let ticket = self.load(id).await?;
        authorize(actor, TicketOperation::Finish, Some(&ticket))?;

        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let solution = required_text("Solution", &dto.solution)?;

        match ticket.status {
            TicketStatus::InProgress => {}
            TicketStatus::Pending => {
                return Err(AppError::Conflict(format!(
                    "Ticket '{}' must be started before it can be finished",
                    id
                )))
            }
            TicketStatus::Finished => {
                return Err(AppError::Conflict(format!(
                    "Ticket '{}' is already finished",
                    id
                )))
            }
        }

        let now = timestamp_now();
        let changes = TicketChanges {
            guard: MutationGuard::InProgress,
            status: Some(TicketStatus::Finished),
            end_time: Some(now),
            solution: Some(solution.clone()),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::solution(now, solution);

        let ticket = self.apply(id, changes, entry).await?.ok_or_else(|| {
            AppError::Conflict(format!("Ticket '{}' is already finished", id))
        })?;
        tracing::info!("Ticket finished: id={}, by={}", id, actor.sub);
        Ok(ticket)
    }

    /// Merge an administrator's edits (status, urgency, cost) into a ticket
    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateTicketDto,
    ) -> Result<Ticket> {
        let ticket = self.load(id).await?;
        authorize(actor, TicketOperation::Update, Some(&ticket))?;

        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if dto.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let now = timestamp_now();
        let mut changes = TicketChanges {
            urgency: dto.urgency,
            cost: dto.cost.map(to_cost).transpose()?,
            ..TicketChanges::at(now)
        };

        if let Some(status) = dto.status {
            if !ticket.status.can_advance_to(status) {
                return Err(AppError::Conflict(format!(
                    "Ticket status cannot move back from {} to {}",
                    ticket.status, status
                )));
            }
            if status == TicketStatus::Finished && ticket.status != TicketStatus::Finished {
                return Err(AppError::Validation(
                    "A solution is required to finish a ticket; use the finish operation"
                        .to_string(),
                ));
            }
            changes.guard = if status == TicketStatus::InProgress && !ticket.is_started() {
                changes.start_time = Some(now);
                MutationGuard::NotStarted
            } else {
                MutationGuard::StatusAtMost(status)
            };
            changes.status = Some(status);
        }

        let entry = HistoryEntry::status_change(now, dto.status.unwrap_or(ticket.status));

        let ticket = self.apply(id, changes, entry).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "Ticket '{}' moved past the requested status concurrently",
                id
            ))
        })?;
        tracing::info!(
            "Ticket updated: id={}, status={}, by={}",
            id,
            ticket.status,
            actor.sub
        );
        Ok(ticket)
    }

    /// Record the filer's feedback and rating on a finished ticket, once
    pub async fn submit_feedback(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: SubmitFeedbackDto,
    ) -> Result<Ticket> {
        let ticket = self.load(id).await?;
        authorize(actor, TicketOperation::SubmitFeedback, Some(&ticket))?;

        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let feedback = required_text("Feedback", &dto.feedback)?;

        if ticket.status != TicketStatus::Finished {
            return Err(AppError::Conflict(
                "Feedback can only be submitted for finished tickets".to_string(),
            ));
        }
        if ticket.has_feedback() {
            return Err(AppError::Conflict(
                "Feedback has already been submitted for this ticket".to_string(),
            ));
        }

        let now = timestamp_now();
        let changes = TicketChanges {
            guard: MutationGuard::AwaitingFeedback,
            feedback: Some(feedback.clone()),
            rating: Some(dto.rating),
            ..TicketChanges::at(now)
        };
        let entry = HistoryEntry::feedback(now, feedback, dto.rating);

        let ticket = self.apply(id, changes, entry).await?.ok_or_else(|| {
            AppError::Conflict("Feedback has already been submitted for this ticket".to_string())
        })?;
        tracing::info!(
            "Feedback submitted: id={}, rating={}, by={}",
            id,
            dto.rating,
            actor.sub
        );
        Ok(ticket)
    }
}

/// Current time at the microsecond precision PostgreSQL `TIMESTAMPTZ` keeps,
/// so a ticket reads back equal to what was written
fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Trimmed value of a required text field; blank input is a validation error
fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn to_cost(value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(2))
        .map_err(|_| AppError::Validation(format!("Invalid cost: {}", value)))
}
