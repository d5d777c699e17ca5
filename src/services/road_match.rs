//! Road-name matching against route steps
//!
//! Names are compared after normalization: lowercase ASCII letters and digits
//! only, with a `1` that starts a run of three or more digits read as the
//! letter `i` (so "135" and "I-35" collide, as they do in scanned signage).

use crate::defaults::DEFAULT_AVOID_MATCH_MIN_LEN;
use crate::services::routing::RouteStep;

/// Normalize a road name or a haystack of names.
pub fn normalize_road_name(raw: &str) -> String {
    let folded: Vec<char> = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    folded
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let digits_after = folded[i + 1..].iter().take_while(|d| d.is_ascii_digit()).count();
            if c == '1' && digits_after >= 2 { 'i' } else { c }
        })
        .collect()
}

/// Substring matcher with a minimum query length
#[derive(Debug, Clone, Copy)]
pub struct RoadMatcher {
    /// Normalized queries shorter than this never match
    pub min_query_len: usize,
}

impl Default for RoadMatcher {
    fn default() -> Self {
        Self { min_query_len: DEFAULT_AVOID_MATCH_MIN_LEN }
    }
}

impl RoadMatcher {
    pub fn new(min_query_len: usize) -> Self {
        Self { min_query_len }
    }

    /// Normalized haystack of all step names and reference codes
    pub fn haystack(steps: &[RouteStep]) -> String {
        let joined = steps
            .iter()
            .map(|s| match &s.reference {
                Some(r) => format!("{} {}", s.name, r),
                None => s.name.clone(),
            })
            .collect::<Vec<_>>()
            .join("|");
        normalize_road_name(&joined)
    }

    /// Avoid-list entries (as given) that occur in the steps.
    pub fn matching_names<'a>(&self, steps: &[RouteStep], avoid: &'a [String]) -> Vec<&'a str> {
        if avoid.is_empty() || steps.is_empty() {
            return vec![];
        }
        let haystack = Self::haystack(steps);
        avoid
            .iter()
            .filter(|raw| {
                let query = normalize_road_name(raw);
                query.len() >= self.min_query_len && haystack.contains(&query)
            })
            .map(String::as_str)
            .collect()
    }

    /// Whether any avoid-list entry occurs in the steps.
    pub fn uses_avoided(&self, steps: &[RouteStep], avoid: &[String]) -> bool {
        !self.matching_names(steps, avoid).is_empty()
    }
}
