use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::statistics::services::Statistics;
use crate::shared::constants::SECTOR_FILTER_ALL;

/// Query params for the statistics report
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
pub struct StatisticsQuery {
    /// First day of the range, inclusive (YYYY-MM-DD, default: today)
    pub start_date: Option<NaiveDate>,
    /// Last day of the range, inclusive (YYYY-MM-DD, default: today)
    pub end_date: Option<NaiveDate>,
    /// Sector to report on, or `all`
    #[serde(default = "default_sector")]
    #[validate(length(min = 1, max = 100, message = "Sector must not be empty"))]
    pub sector: String,
    /// Range slider: `v` selects the last `100 - v` days up to today.
    /// Takes precedence over the explicit dates.
    #[param(minimum = 0, maximum = 100)]
    #[validate(range(max = 100, message = "Slider must be between 0 and 100"))]
    pub slider: Option<u32>,
}

fn default_sector() -> String {
    SECTOR_FILTER_ALL.to_string()
}

impl Default for StatisticsQuery {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            sector: default_sector(),
            slider: None,
        }
    }
}

/// Response DTO for the statistics report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatisticsReportDto {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sector: String,
    /// Sector filter choices: `all` followed by every sector seen on a ticket
    pub sectors: Vec<String>,
    pub statistics: Statistics,
}
