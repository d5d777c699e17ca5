//! Rule-weighted scheduler
//!
//! Same greedy loop as the base order builder, scored with the policy picked
//! by the rule set's priority. Each step fans out one evaluation per
//! candidate (avoidance lookup included) and joins them all before the
//! minimum is taken, so the outcome only depends on matrix, rules and cache.

use futures::future::join_all;
use tracing::{debug, info};

use crate::services::avoidance::LegAvoidance;
use crate::services::order_builder::{close_loop, START_INDEX};
use crate::services::routing::DurationMatrix;
use crate::services::schedule::{compute_schedule, visit};
use crate::services::scoring::{
    evaluate_candidate, pick_best, CandidateEval, CandidatePools, ScoreWeights, ScoringPolicy,
};
use crate::types::{PlannedRoute, RuleSet};

/// Build the final order and schedule under `rules`.
///
/// Stops come from `avoidance`, the run's snapshot. A failed avoidance lookup
/// scores the leg as clean.
pub async fn schedule_with_rules(
    avoidance: &LegAvoidance,
    matrix: &DurationMatrix,
    start_time: f64,
    rules: &RuleSet,
    round_trip: bool,
) -> PlannedRoute {
    let stops = avoidance.stops();
    if stops.is_empty() {
        return PlannedRoute { order: vec![], schedule: vec![] };
    }

    let policy = ScoringPolicy::for_priority(rules.priority);
    let weights = ScoreWeights::from_rules(&policy, rules);
    let avoid = rules.avoid_road_names.as_slice();

    let mut pools = CandidatePools::new(stops, START_INDEX);
    let mut order = Vec::with_capacity(stops.len() + 1);
    order.push(START_INDEX);

    let mut current = START_INDEX;
    let mut clock = visit(&stops[START_INDEX], start_time).departure;

    while !pools.is_empty() {
        let candidates = pools.candidates(|c| matrix.is_reachable(current, c));
        let evals: Vec<CandidateEval> = join_all(candidates.into_iter().filter_map(|c| {
            let stop = stops.get(c)?;
            let travel = matrix.duration(current, c);
            Some(async move {
                let uses = if travel.is_finite() {
                    avoidance.uses_avoided_road_or_clean(current, c, avoid).await
                } else {
                    false
                };
                evaluate_candidate(stop, clock, travel, uses, &weights)
            })
        }))
        .await;

        let Some(best) = pick_best(&evals).copied() else {
            break;
        };
        debug!(
            "Picked stop {} (score {:.1}, avoided road {}) from {} candidates",
            best.index,
            best.score,
            best.uses_avoided_road,
            evals.len()
        );
        order.push(best.index);
        pools.remove(best.index);
        current = best.index;
        clock = best.departure;
    }

    close_loop(&mut order, round_trip);
    let schedule = compute_schedule(&order, stops, matrix, start_time);
    let route = PlannedRoute { order, schedule };

    info!(
        "Rule-weighted order ({}): {} visits, {} infeasible",
        policy.name,
        route.order.len(),
        route.infeasible_count()
    );
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::avoidance::LegAvoidanceCache;
    use crate::services::order_builder::build_base_order;
    use crate::services::road_match::RoadMatcher;
    use crate::services::testing::{stub_stop, StubRoutingService};
    use crate::types::{Priority, Stop};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const START: f64 = 8.0 * 3600.0;

    fn avoidance(
        stub: StubRoutingService,
        stops: Vec<Stop>,
    ) -> (Arc<StubRoutingService>, LegAvoidance) {
        let stub = Arc::new(stub);
        let avoidance = LegAvoidance::new(
            Arc::new(LegAvoidanceCache::new()),
            stub.clone(),
            stops.into(),
            RoadMatcher::default(),
        );
        (stub, avoidance)
    }

    fn rules(priority: Priority, avoid: &[&str]) -> RuleSet {
        RuleSet::new(priority, avoid.iter().map(|s| s.to_string()).collect())
    }

    /// Stop 2 is urgent, far away and only open early; 1 and 3 are close.
    fn urgent_scenario() -> (Vec<Stop>, StubRoutingService) {
        let stops = vec![
            stub_stop(0, false, None, 0.0),
            stub_stop(1, false, None, 600.0),
            stub_stop(2, true, Some((START, START + 1_000.0)), 300.0),
            stub_stop(3, false, None, 600.0),
        ];
        let stub = StubRoutingService::from_matrix(&[
            &[0.0, 120.0, 900.0, 180.0],
            &[120.0, 0.0, 900.0, 120.0],
            &[900.0, 900.0, 0.0, 900.0],
            &[180.0, 120.0, 900.0, 0.0],
        ]);
        (stops, stub)
    }

    #[tokio::test]
    async fn test_urgent_rule_visits_urgent_stop_first() {
        let (stops, stub) = urgent_scenario();
        let m = stub.duration_matrix();
        let (_, avoidance) = avoidance(stub, stops);

        let route = schedule_with_rules(&avoidance, &m, START, &rules(Priority::Urgent, &[]), false).await;

        assert_eq!(route.order[..2], [0, 2]);
        assert!(route.schedule[1].feasible);
    }

    #[test]
    fn test_base_order_without_urgency_takes_nearer_stop() {
        let (mut stops, stub) = urgent_scenario();
        let m = stub.duration_matrix();
        stops[2].urgent = false;

        let base = build_base_order(&stops, &m, START, false);
        assert_eq!(base.order[1], 1);
    }

    #[tokio::test]
    async fn test_avoided_leg_is_penalized() {
        // 0 -> 1 is slightly shorter but runs over Main Street.
        let stops = vec![
            stub_stop(0, false, None, 0.0),
            stub_stop(1, false, None, 0.0),
            stub_stop(2, false, None, 0.0),
        ];
        let stub = StubRoutingService::from_matrix(&[
            &[0.0, 100.0, 200.0],
            &[100.0, 0.0, 100.0],
            &[200.0, 100.0, 0.0],
        ])
        .with_roads(0, 1, 100.0, &["Main Street"]);
        let m = stub.duration_matrix();
        let (_, avoidance) = avoidance(stub, stops);

        let route =
            schedule_with_rules(&avoidance, &m, START, &rules(Priority::Balanced, &["Main Street"]), false)
                .await;
        assert_eq!(route.order, vec![0, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_lookup_does_not_block_scheduling() {
        let stops = vec![
            stub_stop(0, false, None, 0.0),
            stub_stop(1, false, None, 0.0),
            stub_stop(2, false, None, 0.0),
        ];
        let stub = StubRoutingService::from_matrix(&[
            &[0.0, 100.0, 200.0],
            &[100.0, 0.0, 100.0],
            &[200.0, 100.0, 0.0],
        ])
        .failing_leg(0, 1)
        .failing_leg(0, 2);
        let m = stub.duration_matrix();
        let (_, avoidance) = avoidance(stub, stops);

        let route =
            schedule_with_rules(&avoidance, &m, START, &rules(Priority::Balanced, &["Main Street"]), true)
                .await;
        assert_eq!(route.order, vec![0, 1, 2, 0]);
    }

    #[tokio::test]
    async fn test_repeated_runs_reuse_cache_and_agree() {
        let (stops, stub) = urgent_scenario();
        let m = stub.duration_matrix();
        let (stub, avoidance) = avoidance(stub, stops);
        let r = rules(Priority::TimeWindow, &["Main Street"]);

        let first = schedule_with_rules(&avoidance, &m, START, &r, true).await;
        let calls = stub.leg_calls.load(Ordering::SeqCst);
        let second = schedule_with_rules(&avoidance, &m, START, &r, true).await;

        assert_eq!(first, second);
        assert_eq!(stub.leg_calls.load(Ordering::SeqCst), calls);
        assert_eq!(first.order.len(), 5);
    }

    #[tokio::test]
    async fn test_every_priority_takes_reachable_urgent_stop_first() {
        // Stop 1 is a minute away, urgent stop 2 is fifty minutes away.
        let stops = vec![
            stub_stop(0, false, None, 0.0),
            stub_stop(1, false, None, 0.0),
            stub_stop(2, true, None, 0.0),
        ];
        let stub = StubRoutingService::from_matrix(&[
            &[0.0, 60.0, 3_000.0],
            &[60.0, 0.0, 3_000.0],
            &[3_000.0, 3_000.0, 0.0],
        ]);
        let m = stub.duration_matrix();
        let (_, avoidance) = avoidance(stub, stops);

        for priority in [Priority::Urgent, Priority::TimeWindow, Priority::Balanced] {
            let route = schedule_with_rules(&avoidance, &m, START, &rules(priority, &[]), false).await;
            assert_eq!(route.order, vec![0, 2, 1], "priority {:?}", priority);
        }
    }

    #[tokio::test]
    async fn test_unreachable_urgent_stop_is_deferred() {
        let stops = vec![
            stub_stop(0, false, None, 0.0),
            stub_stop(1, false, None, 0.0),
            stub_stop(2, true, None, 0.0),
        ];
        let m = DurationMatrix::from_rows(vec![
            vec![Some(0.0), Some(100.0), None],
            vec![Some(100.0), Some(0.0), Some(100.0)],
            vec![Some(100.0), Some(100.0), Some(0.0)],
        ])
        .unwrap();
        let stub = StubRoutingService::from_matrix(&[
            &[0.0, 100.0, 100.0],
            &[100.0, 0.0, 100.0],
            &[100.0, 100.0, 0.0],
        ]);
        let (_, avoidance) = avoidance(stub, stops);

        let route = schedule_with_rules(&avoidance, &m, START, &rules(Priority::Urgent, &[]), false).await;
        assert_eq!(route.order, vec![0, 1, 2]);
        assert!(route.schedule.iter().all(|e| e.departure.is_finite()));
    }

    #[tokio::test]
    async fn test_empty_avoid_list_makes_no_lookups() {
        let (stops, stub) = urgent_scenario();
        let m = stub.duration_matrix();
        let (stub, avoidance) = avoidance(stub, stops);

        schedule_with_rules(&avoidance, &m, START, &rules(Priority::Balanced, &[]), false).await;
        assert_eq!(stub.leg_calls.load(Ordering::SeqCst), 0);
    }
}
