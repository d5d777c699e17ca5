//! Routing rule set produced by the rule interpreter

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::{
    DEFAULT_AVOID_ROAD_PENALTY, DEFAULT_LATENESS_WEIGHT, DEFAULT_URGENT_WEIGHT,
    DEFAULT_WAIT_WEIGHT, MIN_AVOID_ROAD_PENALTY, MIN_WAIT_WEIGHT,
};

/// Which stops win when choosing the next stop to visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    TimeWindow,
    #[default]
    Balanced,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::TimeWindow => "timewindow",
            Priority::Balanced => "balanced",
        }
    }

    /// Unknown values fall back to balanced.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "urgent" => Priority::Urgent,
            "timewindow" | "time_window" | "time-window" => Priority::TimeWindow,
            _ => Priority::Balanced,
        }
    }
}

/// Numeric weights of the rule-weighted scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleWeights {
    pub urgent: f64,
    pub lateness: f64,
    pub wait: f64,
    /// Seconds added to a leg that uses an avoided road
    pub avoid_road_penalty: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            urgent: DEFAULT_URGENT_WEIGHT,
            lateness: DEFAULT_LATENESS_WEIGHT,
            wait: DEFAULT_WAIT_WEIGHT,
            avoid_road_penalty: DEFAULT_AVOID_ROAD_PENALTY,
        }
    }
}

/// Structured routing rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub priority: Priority,
    pub avoid_road_names: Vec<String>,
    pub weights: RuleWeights,
    /// Changes whenever cached leg lookups must be thrown away
    pub cache_buster: String,
}

impl RuleSet {
    pub fn new(priority: Priority, avoid_road_names: Vec<String>) -> Self {
        Self {
            priority,
            avoid_road_names,
            weights: RuleWeights::default(),
            cache_buster: fresh_cache_buster(),
        }
    }

    pub fn has_avoid_list(&self) -> bool {
        !self.avoid_road_names.is_empty()
    }

    /// Normalize an interpreter response.
    ///
    /// Accepts snake_case and camelCase keys as well as the nested `weights`
    /// object this type serializes to. Missing, non-finite or out-of-range
    /// values are replaced by defaults.
    pub fn from_value(raw: &Value) -> Self {
        let weights = raw.get("weights");
        let pick = |snake: &str, camel: &str, nested: &str| -> Option<&Value> {
            raw.get(snake)
                .or_else(|| raw.get(camel))
                .or_else(|| weights.and_then(|w| w.get(nested)))
        };

        let priority = raw
            .get("priority")
            .and_then(Value::as_str)
            .map(Priority::parse)
            .unwrap_or_default();

        let avoid_road_names = raw
            .get("avoid_road_names")
            .or_else(|| raw.get("avoidRoadNames"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let urgent = number(pick("urgent_weight", "urgentWeight", "urgent"))
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_URGENT_WEIGHT);
        let lateness = number(pick("lateness_weight", "latenessWeight", "lateness"))
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_LATENESS_WEIGHT);
        let wait = number(pick("wait_weight", "waitWeight", "wait"))
            .filter(|v| *v >= MIN_WAIT_WEIGHT)
            .unwrap_or(DEFAULT_WAIT_WEIGHT);
        let avoid_road_penalty =
            number(pick("avoid_road_penalty", "avoidRoadPenalty", "avoidRoadPenalty"))
                .filter(|v| *v >= MIN_AVOID_ROAD_PENALTY)
                .unwrap_or(DEFAULT_AVOID_ROAD_PENALTY);

        let cache_buster = raw
            .get("cache_buster")
            .or_else(|| raw.get("cacheBuster"))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(fresh_cache_buster);

        Self {
            priority,
            avoid_road_names,
            weights: RuleWeights { urgent, lateness, wait, avoid_road_penalty },
            cache_buster,
        }
    }
}

/// Finite number from a JSON number or numeric string
fn number(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn fresh_cache_buster() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
