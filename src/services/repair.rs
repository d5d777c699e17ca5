//! Local repair of avoided-road legs on an already built order
//!
//! Two strategies are supported. `AdjacentSwap` (default) re-scores a flagged
//! leg against swapping its target with the following stop, using the best
//! alternative path of each leg. `ReverseCheck` swaps the two ends of a
//! flagged leg when the reversed leg is clean. Neither moves the start stop
//! or the closing return of a round trip.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::services::avoidance::LegAvoidance;
use crate::services::leg_selection::best_leg;
use crate::services::routing::DurationMatrix;
use crate::types::{Priority, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    /// Urgent partition, then adjacent swaps scored on alternative paths
    #[default]
    AdjacentSwap,
    /// Swap the ends of an avoided leg when the reverse leg is clean
    ReverseCheck,
}

impl RepairStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::AdjacentSwap => "adjacent-swap",
            RepairStrategy::ReverseCheck => "reverse-check",
        }
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "adjacent-swap" => Ok(RepairStrategy::AdjacentSwap),
            "reverse-check" => Ok(RepairStrategy::ReverseCheck),
            other => Err(format!("unknown repair strategy '{}'", other)),
        }
    }
}

/// Run `strategy` over `order`. Orders without an avoid list come back as is.
pub async fn repair_order(
    strategy: RepairStrategy,
    order: Vec<usize>,
    rules: &RuleSet,
    avoidance: &LegAvoidance,
    matrix: &DurationMatrix,
) -> Vec<usize> {
    if !rules.has_avoid_list() || order.len() < 3 {
        return order;
    }
    let repaired = match strategy {
        RepairStrategy::AdjacentSwap => adjacent_swap(order, rules, avoidance, matrix).await,
        RepairStrategy::ReverseCheck => reverse_check(order, rules, avoidance).await,
    };
    info!("Repair pass ({}) done", strategy);
    repaired
}

/// Number of positions that may be reordered, excluding a closing return.
fn body_len(order: &[usize]) -> usize {
    if order.len() > 1 && order.first() == order.last() {
        order.len() - 1
    } else {
        order.len()
    }
}

/// Stable urgent-then-normal partition behind the pinned start.
fn partition_urgent(order: &mut [usize], avoidance: &LegAvoidance) {
    let end = body_len(order);
    if end < 3 {
        return;
    }
    let stops = avoidance.stops();
    let is_urgent = |i: usize| stops.get(i).is_some_and(|s| s.urgent);
    let (urgent, normal): (Vec<usize>, Vec<usize>) =
        order[1..end].iter().partition(|&&i| is_urgent(i));
    for (slot, index) in order[1..end].iter_mut().zip(urgent.into_iter().chain(normal)) {
        *slot = index;
    }
}

/// Memoized best-alternative leg scores for one repair pass
struct LegScores<'a> {
    avoidance: &'a LegAvoidance,
    rules: &'a RuleSet,
    matrix: &'a DurationMatrix,
    memo: HashMap<(usize, usize), f64>,
}

impl<'a> LegScores<'a> {
    fn new(avoidance: &'a LegAvoidance, rules: &'a RuleSet, matrix: &'a DurationMatrix) -> Self {
        Self { avoidance, rules, matrix, memo: HashMap::new() }
    }

    /// Score of the best path `from -> to`; the matrix duration when the
    /// lookup fails.
    async fn score(&mut self, from: usize, to: usize) -> f64 {
        if let Some(&s) = self.memo.get(&(from, to)) {
            return s;
        }
        let stops = self.avoidance.stops();
        let looked_up = match (stops.get(from), stops.get(to)) {
            (Some(a), Some(b)) => {
                let matcher = self.avoidance.matcher();
                best_leg(self.avoidance.routing(), &matcher, a, b, self.rules)
                    .await
                    .map(|leg| leg.score)
                    .map_err(|e| debug!("Leg score {} -> {} from matrix: {:#}", from, to, e))
                    .ok()
            }
            _ => None,
        };
        let score = looked_up.unwrap_or_else(|| self.matrix.duration(from, to));
        self.memo.insert((from, to), score);
        score
    }
}

async fn adjacent_swap(
    mut order: Vec<usize>,
    rules: &RuleSet,
    avoidance: &LegAvoidance,
    matrix: &DurationMatrix,
) -> Vec<usize> {
    if rules.priority == Priority::Urgent {
        partition_urgent(&mut order, avoidance);
    }

    let avoid = rules.avoid_road_names.as_slice();
    let end = body_len(&order);
    let mut scores = LegScores::new(avoidance, rules, matrix);

    let mut i = 0;
    while i + 2 < end {
        let (a, b, c) = (order[i], order[i + 1], order[i + 2]);
        if avoidance.uses_avoided_road_or_clean(a, b, avoid).await {
            let current = scores.score(a, b).await + scores.score(b, c).await;
            let swapped = scores.score(a, c).await + scores.score(c, b).await;
            if swapped < current {
                debug!("Swapping {} and {} ({:.0} -> {:.0})", b, c, current, swapped);
                order.swap(i + 1, i + 2);
            }
        }
        i += 1;
    }
    order
}

async fn reverse_check(mut order: Vec<usize>, rules: &RuleSet, avoidance: &LegAvoidance) -> Vec<usize> {
    let avoid = rules.avoid_road_names.as_slice();
    let end = body_len(&order);

    // Position 0 is the start and stays put
    let mut i = 1;
    while i + 1 < end {
        let (a, b) = (order[i], order[i + 1]);
        if avoidance.uses_avoided_road_or_clean(a, b, avoid).await
            && !avoidance.uses_avoided_road_or_clean(b, a, avoid).await
        {
            debug!("Reversing avoided leg {} -> {}", a, b);
            order.swap(i, i + 1);
        }
        i += 1;
    }
    order
}
