pub mod dtos;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod routes;
pub mod services;
pub mod store;

pub use services::TicketService;
pub use store::{InMemoryTicketStore, PgTicketStore, TicketStore};
