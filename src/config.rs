//! Configuration management

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_AVOID_MATCH_MIN_LEN, DEFAULT_ROUTE_START};
use crate::services::clock::parse_hhmm;
use crate::services::repair::RepairStrategy;
use crate::services::routing::OsrmConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// OSRM routing engine URL (optional, falls back to mock if unset)
    pub osrm_url: Option<String>,

    /// OSRM profile segment, e.g. "driving"
    pub osrm_profile: String,

    /// Rule interpreter proxy URL (optional, local fallback if unset)
    pub interpreter_url: Option<String>,

    /// Timeout for every outgoing HTTP request
    pub http_timeout_seconds: u64,

    /// Route start as HH:MM
    pub route_start: String,

    /// Return to the first stop at the end of the route
    pub round_trip: bool,

    pub repair_strategy: RepairStrategy,

    /// Normalized road names shorter than this never match
    pub avoid_match_min_len: usize,

    /// Directory of the daily log files
    pub logs_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osrm_url: None,
            osrm_profile: "driving".to_string(),
            interpreter_url: None,
            http_timeout_seconds: 30,
            route_start: DEFAULT_ROUTE_START.to_string(),
            round_trip: false,
            repair_strategy: RepairStrategy::default(),
            avoid_match_min_len: DEFAULT_AVOID_MATCH_MIN_LEN,
            logs_dir: "./logs".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup; unset or empty values keep the default.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let http_timeout_seconds = match var("HTTP_TIMEOUT_SECONDS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECONDS must be a whole number, got '{}'", v))?,
            None => defaults.http_timeout_seconds,
        };

        let route_start = var("ROUTE_START").unwrap_or(defaults.route_start);
        parse_hhmm(&route_start).with_context(|| format!("ROUTE_START '{}' is not HH:MM", route_start))?;

        let round_trip = match var("ROUND_TRIP") {
            Some(v) => parse_flag(&v).with_context(|| format!("ROUND_TRIP must be true or false, got '{}'", v))?,
            None => defaults.round_trip,
        };

        let repair_strategy = match var("REPAIR_STRATEGY") {
            Some(v) => v.parse::<RepairStrategy>().map_err(anyhow::Error::msg)?,
            None => defaults.repair_strategy,
        };

        let avoid_match_min_len = match var("AVOID_MATCH_MIN_LEN") {
            Some(v) => v
                .parse()
                .with_context(|| format!("AVOID_MATCH_MIN_LEN must be a whole number, got '{}'", v))?,
            None => defaults.avoid_match_min_len,
        };

        Ok(Self {
            osrm_url: var("OSRM_URL"),
            osrm_profile: var("OSRM_PROFILE").unwrap_or(defaults.osrm_profile),
            interpreter_url: var("INTERPRETER_URL"),
            http_timeout_seconds,
            route_start,
            round_trip,
            repair_strategy,
            avoid_match_min_len,
            logs_dir: var("LOGS_DIR").unwrap_or(defaults.logs_dir),
        })
    }

    /// OSRM client settings, `None` when routing should be mocked.
    pub fn osrm(&self) -> Option<OsrmConfig> {
        self.osrm_url.as_ref().map(|url| OsrmConfig {
            profile: self.osrm_profile.clone(),
            timeout_seconds: self.http_timeout_seconds,
            ..OsrmConfig::new(url.as_str())
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
