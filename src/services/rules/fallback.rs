//! Local rule extraction used when the interpreter is unreachable

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::types::{Priority, RuleSet};

static AVOID_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bavoid\s+([^\n]+)").expect("valid avoid regex"));

static NAME_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[;,]|\s+and\s+").expect("valid separator regex"));

static PRIORITIZE_URGENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bprioriti[sz]e\s+(?:the\s+)?urgent").expect("valid urgent regex"));

static PRIORITIZE_WINDOWS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bprioriti[sz]e\s+(?:the\s+)?time[\s_-]?windows?").expect("valid window regex")
});

/// Road names from every "avoid X, Y and Z" phrase, in order of appearance.
pub fn avoid_names(text: &str) -> Vec<String> {
    AVOID_PHRASE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|list| NAME_SEPARATOR.split(list.as_str()))
        .map(|name| name.trim().trim_end_matches('.').trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Priority from "prioritize urgent" / "prioritize time window"; urgent wins
/// when both appear.
pub fn priority(text: &str) -> Priority {
    if PRIORITIZE_URGENT.is_match(text) {
        Priority::Urgent
    } else if PRIORITIZE_WINDOWS.is_match(text) {
        Priority::TimeWindow
    } else {
        Priority::Balanced
    }
}

/// Rule set from free text, with default weights.
pub fn fallback_interpret(text: &str) -> RuleSet {
    RuleSet::from_value(&json!({
        "priority": priority(text).as_str(),
        "avoid_road_names": avoid_names(text),
    }))
}
