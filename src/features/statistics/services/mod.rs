mod aggregator;
mod statistics_service;

pub use aggregator::{compute_statistics, Statistics};
pub use statistics_service::StatisticsService;
