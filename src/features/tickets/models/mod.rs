mod history;
mod ticket;

pub use history::{HistoryEntry, HistoryEntryType, HistoryRecord};
pub use ticket::{
    MutationGuard, NewTicket, Ticket, TicketChanges, TicketRecord, TicketStatus,
    TicketUrgency,
};
