//! Base visiting order: nearest-feasible-next heuristic
//!
//! Starting at stop 0, repeatedly moves to the unvisited stop with the best
//! window-aware score. Reachable urgent stops go before normal ones. No
//! rules and no road information are involved.

use tracing::debug;

use crate::services::routing::DurationMatrix;
use crate::services::schedule::{compute_schedule, visit};
use crate::services::scoring::{
    evaluate_candidate, pick_best, CandidatePools, ScoreWeights, WINDOW_AWARE_BALANCED,
};
use crate::types::{PlannedRoute, Stop};

/// Index of the fixed first stop
pub const START_INDEX: usize = 0;

/// Build the base order and its schedule.
pub fn build_base_order(
    stops: &[Stop],
    matrix: &DurationMatrix,
    start_time: f64,
    round_trip: bool,
) -> PlannedRoute {
    if stops.is_empty() {
        return PlannedRoute { order: vec![], schedule: vec![] };
    }

    let weights = ScoreWeights::base();
    let mut pools = CandidatePools::new(stops, START_INDEX);
    let mut order = Vec::with_capacity(stops.len() + 1);
    order.push(START_INDEX);

    let mut current = START_INDEX;
    let mut clock = visit(&stops[START_INDEX], start_time).departure;

    while !pools.is_empty() {
        let evals: Vec<_> = pools
            .candidates(|c| matrix.is_reachable(current, c))
            .into_iter()
            .filter_map(|c| stops.get(c))
            .map(|stop| {
                evaluate_candidate(stop, clock, matrix.duration(current, stop.index), false, &weights)
            })
            .collect();

        let Some(best) = pick_best(&evals).copied() else {
            break;
        };
        order.push(best.index);
        pools.remove(best.index);
        current = best.index;
        clock = best.departure;
    }

    close_loop(&mut order, round_trip);
    debug!("Base order ({}) built with {} visits", WINDOW_AWARE_BALANCED.name, order.len());

    let schedule = compute_schedule(&order, stops, matrix, start_time);
    PlannedRoute { order, schedule }
}

/// Append the start again when a round trip is requested.
pub fn close_loop(order: &mut Vec<usize>, round_trip: bool) {
    if round_trip && order.len() > 1 && order.last() != Some(&START_INDEX) {
        order.push(START_INDEX);
    }
}
