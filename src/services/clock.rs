//! Clock strings <-> seconds since midnight

use chrono::{NaiveTime, Timelike};

use crate::error::{PlanError, PlanResult};

/// Parse "HH:MM" into seconds since midnight.
pub fn parse_hhmm(value: &str) -> PlanResult<f64> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|t| t.num_seconds_from_midnight() as f64)
        .map_err(|_| PlanError::InvalidTime(value.to_string()))
}

/// Format seconds since midnight as "HH:MM".
///
/// Negative values clamp to 00:00 and hours keep counting past midnight.
pub fn format_hhmm(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 3600, (total % 3600) / 60)
}
