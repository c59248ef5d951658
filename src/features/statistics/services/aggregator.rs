use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::tickets::models::{Ticket, TicketStatus};
use crate::shared::constants::SECTOR_FILTER_ALL;

/// Service outcome figures over a set of tickets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Statistics {
    pub total: i64,
    pub finished: i64,
    pub in_progress: i64,
    /// Mean hours from start to end of service over finished tickets
    pub average_time: f64,
    pub total_cost: f64,
    /// Mean satisfaction rating (1-10) over rated tickets
    pub average_rating: f64,
}

/// Aggregate the tickets created within `start..=end` whose sector matches
/// `sector_filter` (`"all"` matches every sector).
///
/// Averages are 0 when nothing contributes to them.
pub fn compute_statistics(
    tickets: &[Ticket],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    sector_filter: &str,
) -> Statistics {
    let mut stats = Statistics::default();
    let mut hours_sum = 0.0;
    let mut hours_count = 0u32;
    let mut rating_sum = 0.0;
    let mut rating_count = 0u32;

    let included = tickets.iter().filter(|t| {
        t.created_at >= start
            && t.created_at <= end
            && (sector_filter == SECTOR_FILTER_ALL || t.sector == sector_filter)
    });

    for ticket in included {
        stats.total += 1;
        match ticket.status {
            TicketStatus::Finished => {
                stats.finished += 1;
                if let Some(hours) = ticket.resolution_hours() {
                    hours_sum += hours;
                    hours_count += 1;
                }
            }
            TicketStatus::InProgress => stats.in_progress += 1,
            TicketStatus::Pending => {}
        }

        stats.total_cost += ticket.cost.and_then(|c| c.to_f64()).unwrap_or(0.0);

        if let Some(rating) = ticket.rating {
            rating_sum += f64::from(rating);
            rating_count += 1;
        }
    }

    if hours_count > 0 {
        stats.average_time = hours_sum / f64::from(hours_count);
    }
    if rating_count > 0 {
        stats.average_rating = rating_sum / f64::from(rating_count);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tickets::models::{NewTicket, TicketUrgency};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn ticket(sector: &str, created_at: DateTime<Utc>) -> Ticket {
        Ticket::open(
            NewTicket {
                user_id: "u1".to_string(),
                user_name: "User".to_string(),
                sector: sector.to_string(),
                problem_type: "Hardware".to_string(),
                description: "Monitor flickers".to_string(),
                urgency: TicketUrgency::Medium,
            },
            created_at,
        )
    }

    fn finished(sector: &str, created_at: DateTime<Utc>, hours: i64) -> Ticket {
        let mut t = ticket(sector, created_at);
        let start = created_at + Duration::minutes(30);
        t.status = TicketStatus::Finished;
        t.start_time = Some(start);
        t.end_time = Some(start + Duration::hours(hours));
        t
    }

    #[test]
    fn test_empty_input_is_all_zeros() {
        let stats = compute_statistics(&[], at(1, 0), at(31, 23), "all");
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_average_time_in_hours() {
        let tickets = vec![finished("RH", at(2, 9), 2), finished("RH", at(3, 9), 4)];
        let stats = compute_statistics(&tickets, at(1, 0), at(31, 23), "all");

        assert_eq!(stats.total, 2);
        assert_eq!(stats.finished, 2);
        assert_eq!(stats.average_time, 3.0);
    }

    #[test]
    fn test_sector_filter() {
        let tickets = vec![ticket("RH", at(5, 10))];

        assert_eq!(
            compute_statistics(&tickets, at(1, 0), at(31, 23), "Financeiro").total,
            0
        );
        assert_eq!(compute_statistics(&tickets, at(1, 0), at(31, 23), "all").total, 1);
        assert_eq!(compute_statistics(&tickets, at(1, 0), at(31, 23), "RH").total, 1);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let tickets = vec![
            ticket("RH", at(10, 0)),
            ticket("RH", at(12, 0)),
            ticket("RH", at(12, 1)),
        ];
        let stats = compute_statistics(&tickets, at(10, 0), at(12, 0), "all");
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn test_cost_rating_and_progress_counts() {
        let mut rated = finished("Compras", at(4, 8), 1);
        rated.rating = Some(8);
        rated.cost = Some(Decimal::new(10050, 2));

        let mut rated_low = finished("Compras", at(4, 9), 1);
        rated_low.rating = Some(5);

        let mut in_progress = ticket("Compras", at(4, 10));
        in_progress.status = TicketStatus::InProgress;
        in_progress.start_time = Some(at(4, 11));
        in_progress.cost = Some(Decimal::new(25, 0));

        let pending = ticket("Compras", at(4, 12));

        let stats = compute_statistics(
            &[rated, rated_low, in_progress, pending],
            at(1, 0),
            at(31, 23),
            "Compras",
        );

        assert_eq!(stats.total, 4);
        assert_eq!(stats.finished, 2);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.total_cost, 125.5);
        assert_eq!(stats.average_rating, 6.5);
        assert_eq!(stats.average_time, 1.0);
    }

    #[test]
    fn test_finished_without_timestamps_skipped_from_average() {
        let mut no_times = ticket("RH", at(6, 9));
        no_times.status = TicketStatus::Finished;
        let tickets = vec![no_times, finished("RH", at(6, 10), 5)];

        let stats = compute_statistics(&tickets, at(1, 0), at(31, 23), "all");
        assert_eq!(stats.finished, 2);
        assert_eq!(stats.average_time, 5.0);
    }
}
