//! Who may do what to a ticket.
//!
//! Admins triage: they see every ticket and drive the lifecycle. Users see
//! and rate only the tickets they filed.

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::tickets::models::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOperation {
    Create,
    View,
    ListAll,
    Start,
    Finish,
    Update,
    SubmitFeedback,
}

impl std::fmt::Display for TicketOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketOperation::Create => write!(f, "create"),
            TicketOperation::View => write!(f, "view"),
            TicketOperation::ListAll => write!(f, "list_all"),
            TicketOperation::Start => write!(f, "start"),
            TicketOperation::Finish => write!(f, "finish"),
            TicketOperation::Update => write!(f, "update"),
            TicketOperation::SubmitFeedback => write!(f, "submit_feedback"),
        }
    }
}

/// Check that `actor` may perform `operation`, on `ticket` when one is involved
pub fn authorize(
    actor: &AuthenticatedUser,
    operation: TicketOperation,
    ticket: Option<&Ticket>,
) -> Result<()> {
    let owns_ticket = ticket.is_some_and(|t| actor.owns(&t.user_id));

    let allowed = match operation {
        TicketOperation::Create => true,
        TicketOperation::View => actor.is_admin() || owns_ticket,
        TicketOperation::ListAll
        | TicketOperation::Start
        | TicketOperation::Finish
        | TicketOperation::Update => actor.is_admin(),
        TicketOperation::SubmitFeedback => owns_ticket,
    };

    if allowed {
        return Ok(());
    }

    tracing::warn!(
        "Refused {} for user={} role={} ticket={:?}",
        operation,
        actor.sub,
        actor.role,
        ticket.map(|t| t.id)
    );

    let message = match operation {
        TicketOperation::SubmitFeedback => "Only the user who filed the ticket can rate it",
        TicketOperation::View => "You can only view your own tickets",
        _ => "Admin access required",
    };
    Err(AppError::Forbidden(message.to_string()))
}
