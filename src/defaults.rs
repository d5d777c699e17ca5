//! Static defaults shared by the planner, the rule normalizer and the CLI.

/// Route start when nothing else is configured.
pub const DEFAULT_ROUTE_START: &str = "08:00";

/// Service duration assigned to stops created without one.
pub const DEFAULT_SERVICE_MINUTES: f64 = 5.0;

/// Added to a candidate's score when arriving there breaks its window.
pub const INFEASIBLE_PENALTY: f64 = 1_000_000.0;

/// Seconds of travel an urgent stop is worth at `urgent_weight = 1`.
pub const URGENT_BONUS_SECONDS: f64 = 900.0;

/// Lateness multiplier of the timewindow-first policy.
pub const TIMEWINDOW_LATENESS_FACTOR: f64 = 4.0;

/// Urgency bonus multiplier of the timewindow-first policy.
pub const TIMEWINDOW_URGENCY_FACTOR: f64 = 0.5;

pub const DEFAULT_URGENT_WEIGHT: f64 = 1.0;
pub const DEFAULT_LATENESS_WEIGHT: f64 = 1.0;
pub const DEFAULT_WAIT_WEIGHT: f64 = 0.1;
pub const MIN_WAIT_WEIGHT: f64 = 0.05;
pub const DEFAULT_AVOID_ROAD_PENALTY: f64 = 1200.0;
pub const MIN_AVOID_ROAD_PENALTY: f64 = 300.0;

/// Normalized road names shorter than this never match.
pub const DEFAULT_AVOID_MATCH_MIN_LEN: usize = 4;
