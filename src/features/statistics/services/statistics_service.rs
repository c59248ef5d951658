use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::statistics::dtos::{StatisticsQuery, StatisticsReportDto};
use crate::features::statistics::services::compute_statistics;
use crate::features::tickets::store::TicketStore;
use crate::shared::constants::{SECTOR_FILTER_ALL, SLIDER_MAX};

pub struct StatisticsService {
    store: Arc<dyn TicketStore>,
}

impl StatisticsService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Build the report for `query`, resolving relative ranges against `today`
    pub async fn report(&self, query: StatisticsQuery, today: NaiveDate) -> Result<StatisticsReportDto> {
        query
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let (start_date, end_date) = resolve_range(&query, today)?;
        let tickets = self.store.list_all().await?;

        let statistics = compute_statistics(
            &tickets,
            start_of_day(start_date),
            end_of_day(end_date)?,
            &query.sector,
        );

        let sectors = std::iter::once(SECTOR_FILTER_ALL.to_string())
            .chain(
                tickets
                    .iter()
                    .map(|t| t.sector.clone())
                    .collect::<BTreeSet<_>>(),
            )
            .collect();

        tracing::debug!(
            "Statistics computed: {}..={} sector={} total={}",
            start_date,
            end_date,
            query.sector,
            statistics.total
        );

        Ok(StatisticsReportDto {
            start_date,
            end_date,
            sector: query.sector,
            sectors,
            statistics,
        })
    }
}

/// Inclusive day range selected by the query; today only when nothing is given
fn resolve_range(query: &StatisticsQuery, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    if let Some(slider) = query.slider {
        let days = SLIDER_MAX.checked_sub(slider).ok_or_else(|| {
            AppError::Validation(format!("Slider must be between 0 and {}", SLIDER_MAX))
        })?;
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| AppError::Validation("Date range out of bounds".to_string()))?;
        return Ok((start, today));
    }

    let start = query.start_date.unwrap_or(today);
    let end = query.end_date.unwrap_or(today);
    if start > end {
        return Err(AppError::Validation(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }
    Ok((start, end))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::Internal(format!("Invalid end of day for {}", date)))
}
