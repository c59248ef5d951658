// =============================================================================
// REPORTING
// =============================================================================

/// Sector filter value that matches every sector
pub const SECTOR_FILTER_ALL: &str = "all";

/// Upper bound of the report date-range slider; a slider value `v` selects
/// the last `SLIDER_MAX - v` days
pub const SLIDER_MAX: u32 = 100;
