//! Candidate scoring shared by the order builder and the rule scheduler
//!
//! A score is in "seconds of travel" units: lower is better. Every policy
//! draws from the urgent pool while it has a reachable stop; the named
//! policies below only decide how strongly urgency and lateness count.

use crate::defaults::{
    DEFAULT_LATENESS_WEIGHT, INFEASIBLE_PENALTY, TIMEWINDOW_LATENESS_FACTOR,
    TIMEWINDOW_URGENCY_FACTOR, URGENT_BONUS_SECONDS,
};
use crate::types::{Priority, RuleSet, Stop};

/// Travel weight of the plain heuristic, a tie-breaker next to lateness
const BASE_TRAVEL_WEIGHT: f64 = 0.1;
/// Wait weight of the plain heuristic
const BASE_WAIT_WEIGHT: f64 = 0.01;

/// A named scoring strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub name: &'static str,
    /// Multiplier on the rule set's urgency bonus
    pub urgency_factor: f64,
    /// Multiplier on the rule set's lateness weight
    pub lateness_factor: f64,
}

/// Policy of the plain heuristic, before any rules
pub const WINDOW_AWARE_BALANCED: ScoringPolicy = ScoringPolicy {
    name: "window-aware-balanced",
    urgency_factor: 0.0,
    lateness_factor: 1.0,
};

pub const URGENT_FIRST: ScoringPolicy = ScoringPolicy {
    name: "urgent-first",
    urgency_factor: 1.0,
    lateness_factor: 1.0,
};

pub const TIMEWINDOW_FIRST: ScoringPolicy = ScoringPolicy {
    name: "timewindow-first",
    urgency_factor: TIMEWINDOW_URGENCY_FACTOR,
    lateness_factor: TIMEWINDOW_LATENESS_FACTOR,
};

pub const BALANCED: ScoringPolicy = ScoringPolicy {
    name: "balanced",
    urgency_factor: 1.0,
    lateness_factor: 1.0,
};

impl ScoringPolicy {
    pub fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::Urgent => URGENT_FIRST,
            Priority::TimeWindow => TIMEWINDOW_FIRST,
            Priority::Balanced => BALANCED,
        }
    }
}

/// Resolved coefficients of one scoring run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub lateness: f64,
    pub wait: f64,
    pub travel: f64,
    /// Subtracted from urgent candidates
    pub urgency_bonus: f64,
    /// Added when the leg uses an avoided road
    pub avoid_penalty: f64,
}

impl ScoreWeights {
    /// Weights of the plain heuristic.
    pub fn base() -> Self {
        Self {
            lateness: DEFAULT_LATENESS_WEIGHT,
            wait: BASE_WAIT_WEIGHT,
            travel: BASE_TRAVEL_WEIGHT,
            urgency_bonus: 0.0,
            avoid_penalty: 0.0,
        }
    }

    pub fn from_rules(policy: &ScoringPolicy, rules: &RuleSet) -> Self {
        let w = &rules.weights;
        Self {
            lateness: w.lateness * policy.lateness_factor,
            wait: w.wait,
            travel: 1.0,
            urgency_bonus: URGENT_BONUS_SECONDS * w.urgent * policy.urgency_factor,
            avoid_penalty: w.avoid_road_penalty,
        }
    }
}

/// Would-be visit of one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEval {
    pub index: usize,
    pub arrival: f64,
    pub service_start: f64,
    pub departure: f64,
    pub wait: f64,
    pub lateness: f64,
    pub feasible: bool,
    pub uses_avoided_road: bool,
    pub score: f64,
}

/// Score visiting `stop` next when the clock reads `clock`.
pub fn evaluate_candidate(
    stop: &Stop,
    clock: f64,
    travel: f64,
    uses_avoided_road: bool,
    weights: &ScoreWeights,
) -> CandidateEval {
    let arrival = clock + travel;
    let service_start = stop.service_start(arrival);
    let (wait, lateness) = match stop.time_window {
        Some(tw) => (tw.wait(arrival), tw.lateness(service_start)),
        None => (0.0, 0.0),
    };
    let feasible = lateness <= 0.0;

    let mut score = lateness * weights.lateness + travel * weights.travel + wait * weights.wait;
    if !feasible {
        score += INFEASIBLE_PENALTY;
    }
    if uses_avoided_road {
        score += weights.avoid_penalty;
    }
    if stop.urgent {
        score -= weights.urgency_bonus;
    }

    CandidateEval {
        index: stop.index,
        arrival,
        service_start,
        departure: service_start + stop.service_seconds,
        wait,
        lateness,
        feasible,
        uses_avoided_road,
        score,
    }
}

/// First candidate with the lowest score.
pub fn pick_best(evals: &[CandidateEval]) -> Option<&CandidateEval> {
    evals.iter().fold(None, |best: Option<&CandidateEval>, e| match best {
        Some(b) if !(e.score < b.score) => Some(b),
        _ => Some(e),
    })
}

/// Unvisited stops split by urgency, each in index order
#[derive(Debug, Clone, Default)]
pub struct CandidatePools {
    urgent: Vec<usize>,
    normal: Vec<usize>,
}

impl CandidatePools {
    /// Every stop except `start`.
    pub fn new(stops: &[Stop], start: usize) -> Self {
        let (urgent, normal) = stops
            .iter()
            .filter(|s| s.index != start)
            .partition::<Vec<&Stop>, _>(|s| s.urgent);
        Self {
            urgent: urgent.into_iter().map(|s| s.index).collect(),
            normal: normal.into_iter().map(|s| s.index).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.urgent.is_empty() && self.normal.is_empty()
    }

    /// Candidates for the next slot in evaluation order.
    ///
    /// The urgent pool wins while it holds a stop for which `reachable` is
    /// true, then the normal pool. Unreachable stops only compete once
    /// nothing reachable is left.
    pub fn candidates(&self, reachable: impl Fn(usize) -> bool) -> Vec<usize> {
        for pool in [&self.urgent, &self.normal] {
            let open: Vec<usize> = pool.iter().copied().filter(|&i| reachable(i)).collect();
            if !open.is_empty() {
                return open;
            }
        }
        if self.urgent.is_empty() {
            self.normal.clone()
        } else {
            self.urgent.clone()
        }
    }

    pub fn remove(&mut self, index: usize) {
        self.urgent.retain(|&i| i != index);
        self.normal.retain(|&i| i != index);
    }
}
