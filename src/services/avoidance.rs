//! Leg avoidance cache
//!
//! Memoizes, per ordered stop pair, whether the best-known path between the
//! two stops runs over an avoided road. Entries remember which normalized
//! names they were checked against and which of those matched, so a query for
//! any subset of the checked names is answered without a provider call.
//!
//! The map is shared by the concurrent candidate lookups of one scheduling
//! step. The lock is only held to read or insert, never across a provider
//! call; two tasks missing the same key both fetch and the later write wins
//! with the same answer.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::services::road_match::{normalize_road_name, RoadMatcher};
use crate::services::routing::RoutingService;
use crate::types::{RuleSet, Stop};

/// Cached lookup result for one ordered pair
#[derive(Debug, Clone, PartialEq)]
pub struct LegAvoidanceEntry {
    pub uses_avoided_road: bool,
    /// Normalized names the leg was checked against
    pub checked: BTreeSet<String>,
    /// Normalized names found on the leg
    pub matched: BTreeSet<String>,
}

impl LegAvoidanceEntry {
    /// Answer for `query` if every name in it was checked.
    fn answer(&self, query: &BTreeSet<String>) -> Option<bool> {
        query
            .is_subset(&self.checked)
            .then(|| query.iter().any(|name| self.matched.contains(name)))
    }
}

#[derive(Debug, Default)]
struct CacheState {
    cache_buster: Option<String>,
    avoid_key: BTreeSet<String>,
    entries: HashMap<(usize, usize), LegAvoidanceEntry>,
}

/// Process-local memo of leg avoidance checks
#[derive(Debug, Default)]
pub struct LegAvoidanceCache {
    state: Mutex<CacheState>,
}

impl LegAvoidanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.cache_buster = None;
        state.avoid_key.clear();
    }

    /// Flush when the rule token or the avoid-list content changed.
    /// Returns whether the cache was flushed.
    pub fn sync_rules(&self, rules: &RuleSet) -> bool {
        let avoid_key = normalized_set(&rules.avoid_road_names);
        let mut state = self.state.lock();
        let unchanged = state.cache_buster.as_deref() == Some(rules.cache_buster.as_str())
            && state.avoid_key == avoid_key;
        if unchanged {
            return false;
        }
        debug!(
            "Flushing {} cached leg checks (rules token {})",
            state.entries.len(),
            rules.cache_buster
        );
        state.entries.clear();
        state.cache_buster = Some(rules.cache_buster.clone());
        state.avoid_key = avoid_key;
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached answer for the pair, if the entry covers the whole query.
    pub fn lookup(&self, from: usize, to: usize, avoid: &[String]) -> Option<bool> {
        let query = normalized_set(avoid);
        self.state.lock().entries.get(&(from, to))?.answer(&query)
    }

    /// Record the result of checking the pair against `avoid`.
    pub fn store(&self, from: usize, to: usize, avoid: &[String], matched: &[&str]) {
        let entry = LegAvoidanceEntry {
            uses_avoided_road: !matched.is_empty(),
            checked: normalized_set(avoid),
            matched: matched.iter().map(|m| normalize_road_name(m)).collect(),
        };
        self.state.lock().entries.insert((from, to), entry);
    }

    #[cfg(test)]
    pub fn entry(&self, from: usize, to: usize) -> Option<LegAvoidanceEntry> {
        self.state.lock().entries.get(&(from, to)).cloned()
    }
}

fn normalized_set(names: &[String]) -> BTreeSet<String> {
    names.iter().map(|n| normalize_road_name(n)).filter(|n| !n.is_empty()).collect()
}

/// Answers "does the leg from A to B use an avoided road" for one run
///
/// Holds a snapshot of the run's stops; pair keys are stop indices.
#[derive(Clone)]
pub struct LegAvoidance {
    cache: Arc<LegAvoidanceCache>,
    routing: Arc<dyn RoutingService>,
    stops: Arc<[Stop]>,
    matcher: RoadMatcher,
}

impl LegAvoidance {
    pub fn new(
        cache: Arc<LegAvoidanceCache>,
        routing: Arc<dyn RoutingService>,
        stops: Arc<[Stop]>,
        matcher: RoadMatcher,
    ) -> Self {
        Self { cache, routing, stops, matcher }
    }

    pub fn matcher(&self) -> RoadMatcher {
        self.matcher
    }

    pub fn routing(&self) -> &dyn RoutingService {
        self.routing.as_ref()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Cache first, then the fastest path's steps from the routing service.
    pub async fn uses_avoided_road(&self, from: usize, to: usize, avoid: &[String]) -> Result<bool> {
        if avoid.is_empty() {
            return Ok(false);
        }
        if let Some(hit) = self.cache.lookup(from, to, avoid) {
            return Ok(hit);
        }

        let a = self.stops.get(from).with_context(|| format!("unknown stop {}", from))?;
        let b = self.stops.get(to).with_context(|| format!("unknown stop {}", to))?;
        let routes = self
            .routing
            .get_leg_routes(&a.coordinates, &b.coordinates, false)
            .await
            .with_context(|| format!("step lookup {} -> {} failed", from, to))?;
        let best = routes
            .first()
            .with_context(|| format!("no path {} -> {}", from, to))?;

        let matched = self.matcher.matching_names(&best.steps, avoid);
        self.cache.store(from, to, avoid, &matched);
        Ok(!matched.is_empty())
    }

    /// Like [`uses_avoided_road`](Self::uses_avoided_road) but a failed lookup
    /// counts as a clean leg.
    pub async fn uses_avoided_road_or_clean(&self, from: usize, to: usize, avoid: &[String]) -> bool {
        match self.uses_avoided_road(from, to, avoid).await {
            Ok(uses) => uses,
            Err(e) => {
                warn!("Avoidance check {} -> {} failed, treating leg as clean: {:#}", from, to, e);
                false
            }
        }
    }
}
