pub mod auth;
pub mod statistics;
pub mod tickets;
