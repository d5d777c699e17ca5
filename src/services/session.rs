//! Planning session: the stops being edited and the last computed routes
//!
//! Runs take `&mut self` and read from an immutable snapshot of the stops,
//! so nothing they compute is visible until the whole run has succeeded.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PlanError, PlanResult};
use crate::services::avoidance::{LegAvoidance, LegAvoidanceCache};
use crate::services::clock::parse_hhmm;
use crate::services::leg_selection::{avoid_hits, select_leg_geometries, RouteDrawing};
use crate::services::order_builder::build_base_order;
use crate::services::repair::{repair_order, RepairStrategy};
use crate::services::road_match::RoadMatcher;
use crate::services::routing::{DurationMatrix, RoutingService};
use crate::services::rules::{resolve_rules, RuleInterpreter};
use crate::services::schedule::compute_schedule;
use crate::services::scheduler::schedule_with_rules;
use crate::types::{AvoidHit, PlanReport, PlannedRoute, RuleSet, Stop, StopDraft};

/// Knobs of a planning run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerSettings {
    /// Seconds since midnight
    pub route_start: f64,
    pub round_trip: bool,
    pub repair_strategy: RepairStrategy,
    /// Road-name matcher floor
    pub min_match_len: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            route_start: 8.0 * 3600.0,
            round_trip: false,
            repair_strategy: RepairStrategy::default(),
            min_match_len: RoadMatcher::default().min_query_len,
        }
    }
}

impl PlannerSettings {
    pub fn from_config(config: &Config) -> PlanResult<Self> {
        Ok(Self {
            route_start: parse_hhmm(&config.route_start)?,
            round_trip: config.round_trip,
            repair_strategy: config.repair_strategy,
            min_match_len: config.avoid_match_min_len,
        })
    }

    fn matcher(&self) -> RoadMatcher {
        RoadMatcher::new(self.min_match_len)
    }
}

/// Result of the heuristic optimization
struct BaseRun {
    stops: Arc<[Stop]>,
    matrix: Arc<DurationMatrix>,
    route: PlannedRoute,
    drawing: RouteDrawing,
}

/// Result of applying rules on top of a base run
struct FinalRun {
    rules: RuleSet,
    route: PlannedRoute,
    drawing: RouteDrawing,
    avoid_hits: Vec<AvoidHit>,
}

pub struct PlanningSession {
    stops: Vec<Stop>,
    persistent_prompt: String,
    adhoc_prompt: String,
    settings: PlannerSettings,
    routing: Arc<dyn RoutingService>,
    interpreter: Arc<dyn RuleInterpreter>,
    cache: Arc<LegAvoidanceCache>,
    base: Option<BaseRun>,
    final_run: Option<FinalRun>,
}

impl PlanningSession {
    pub fn new(
        routing: Arc<dyn RoutingService>,
        interpreter: Arc<dyn RuleInterpreter>,
        settings: PlannerSettings,
    ) -> Self {
        Self::with_cache(routing, interpreter, settings, Arc::new(LegAvoidanceCache::new()))
    }

    pub fn with_cache(
        routing: Arc<dyn RoutingService>,
        interpreter: Arc<dyn RuleInterpreter>,
        settings: PlannerSettings,
        cache: Arc<LegAvoidanceCache>,
    ) -> Self {
        Self {
            stops: vec![],
            persistent_prompt: String::new(),
            adhoc_prompt: String::new(),
            settings,
            routing,
            interpreter,
            cache,
            base: None,
            final_run: None,
        }
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PlannerSettings {
        &mut self.settings
    }

    pub fn cache(&self) -> &LegAvoidanceCache {
        &self.cache
    }

    // ==========================================================================
    // Stop editing
    // ==========================================================================

    /// Append a stop and return its index.
    pub fn add_stop(&mut self, draft: StopDraft) -> PlanResult<usize> {
        let index = self.stops.len();
        self.stops.push(draft.into_stop(index)?);
        Ok(index)
    }

    /// Replace the fields of an existing stop; its index is kept. Moving the
    /// stop flushes cached leg checks, since they were made for the old spot.
    pub fn update_stop(&mut self, index: usize, draft: StopDraft) -> PlanResult<()> {
        let slot = self.stops.get_mut(index).ok_or(PlanError::UnknownStop(index))?;
        let stop = draft.into_stop(index)?;
        let moved = slot.coordinates != stop.coordinates;
        *slot = stop;
        if moved {
            self.cache.invalidate();
        }
        Ok(())
    }

    /// Delete a stop. Later stops move down one index, so computed routes and
    /// cached leg checks are dropped.
    pub fn remove_stop(&mut self, index: usize) -> PlanResult<Stop> {
        if index >= self.stops.len() {
            return Err(PlanError::UnknownStop(index));
        }
        let removed = self.stops.remove(index);
        for (i, stop) in self.stops.iter_mut().enumerate() {
            stop.index = i;
        }
        self.drop_results();
        Ok(removed)
    }

    /// Remove every stop and computed route. Saved prompts are kept.
    pub fn clear(&mut self) {
        self.stops.clear();
        self.drop_results();
    }

    fn drop_results(&mut self) {
        self.base = None;
        self.final_run = None;
        self.cache.invalidate();
    }

    // ==========================================================================
    // Prompts
    // ==========================================================================

    pub fn save_persistent_prompt(&mut self, text: impl Into<String>) {
        self.persistent_prompt = text.into();
        self.cache.invalidate();
    }

    pub fn save_adhoc_prompt(&mut self, text: impl Into<String>) {
        self.adhoc_prompt = text.into();
        self.cache.invalidate();
    }

    pub fn has_rule_text(&self) -> bool {
        !self.persistent_prompt.trim().is_empty() || !self.adhoc_prompt.trim().is_empty()
    }

    // ==========================================================================
    // Runs
    // ==========================================================================

    /// Heuristic optimization: matrix, base order, whole-route geometry.
    pub async fn optimize(&mut self) -> PlanResult<&PlannedRoute> {
        if self.stops.len() < 2 {
            return Err(PlanError::TooFewStops(self.stops.len()));
        }
        for stop in &self.stops {
            stop.validate()?;
        }

        let stops: Arc<[Stop]> = self.stops.clone().into();
        let coordinates: Vec<_> = stops.iter().map(|s| s.coordinates).collect();
        debug!("Optimizing {} stops with {}", stops.len(), self.routing.name());

        let matrix = self
            .routing
            .get_duration_matrix(&coordinates)
            .await
            .map_err(PlanError::Matrix)?;
        if matrix.size() != stops.len() {
            return Err(PlanError::Matrix(anyhow::anyhow!(
                "expected a {}x{} matrix, got {}",
                stops.len(),
                stops.len(),
                matrix.size()
            )));
        }

        let route = build_base_order(&stops, &matrix, self.settings.route_start, self.settings.round_trip);
        let drawing = select_leg_geometries(
            &route.order,
            &stops,
            None,
            self.routing.as_ref(),
            &self.settings.matcher(),
        )
        .await
        .map_err(PlanError::Route)?;

        info!(
            "Base order for {} stops: {} infeasible",
            stops.len(),
            route.infeasible_count()
        );
        self.final_run = None;
        let base = self.base.insert(BaseRun {
            stops,
            matrix: Arc::new(matrix),
            route,
            drawing,
        });
        Ok(&base.route)
    }

    /// Rule-weighted reorder, repair and per-leg geometry on top of the last
    /// base run.
    pub async fn apply_rules(&mut self) -> PlanResult<&PlannedRoute> {
        let base = self.base.as_ref().ok_or(PlanError::NoBaseOrder)?;
        let stops = base.stops.clone();
        let matrix = base.matrix.clone();
        let settings = self.settings;

        let rules = resolve_rules(
            self.interpreter.as_ref(),
            &self.persistent_prompt,
            &self.adhoc_prompt,
            &stops,
        )
        .await;
        self.cache.sync_rules(&rules);

        let matcher = settings.matcher();
        let avoidance = LegAvoidance::new(self.cache.clone(), self.routing.clone(), stops.clone(), matcher);

        let scheduled =
            schedule_with_rules(&avoidance, &matrix, settings.route_start, &rules, settings.round_trip).await;
        let order = repair_order(settings.repair_strategy, scheduled.order, &rules, &avoidance, &matrix).await;
        let schedule = compute_schedule(&order, &stops, &matrix, settings.route_start);
        let route = PlannedRoute { order, schedule };

        let drawing = select_leg_geometries(
            &route.order,
            &stops,
            Some(&rules),
            self.routing.as_ref(),
            &matcher,
        )
        .await
        .map_err(PlanError::Route)?;
        let hits = avoid_hits(&route.order, &avoidance, &rules.avoid_road_names).await;

        info!(
            "Rules applied ({}): {} infeasible, {} legs on avoided roads",
            rules.priority.as_str(),
            route.infeasible_count(),
            hits.len()
        );
        let run = self.final_run.insert(FinalRun {
            rules,
            route,
            drawing,
            avoid_hits: hits,
        });
        Ok(&run.route)
    }

    // ==========================================================================
    // Results
    // ==========================================================================

    pub fn base_route(&self) -> Option<&PlannedRoute> {
        self.base.as_ref().map(|b| &b.route)
    }

    pub fn final_route(&self) -> Option<&PlannedRoute> {
        self.final_run.as_ref().map(|f| &f.route)
    }

    pub fn rules(&self) -> Option<&RuleSet> {
        self.final_run.as_ref().map(|f| &f.rules)
    }

    pub fn avoid_hits(&self) -> &[AvoidHit] {
        self.final_run.as_ref().map_or(&[], |f| f.avoid_hits.as_slice())
    }

    /// Final order if rules were applied, else the base order.
    pub fn current_order(&self) -> Option<&[usize]> {
        self.final_route()
            .or_else(|| self.base_route())
            .map(|r| r.order.as_slice())
    }

    pub fn report(&self) -> PlanReport {
        match (&self.base, &self.final_run) {
            (Some(base), Some(run)) => PlanReport::build(
                &base.stops,
                Some(&base.route),
                Some(&run.route),
                Some(&run.rules),
                Some(&run.drawing),
                &run.avoid_hits,
            ),
            (Some(base), None) => PlanReport::build(
                &base.stops,
                Some(&base.route),
                None,
                None,
                Some(&base.drawing),
                &[],
            ),
            _ => PlanReport::build(&self.stops, None, None, None, None, &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::leg_selection::DrawingMode;
    use crate::services::rules::OfflineInterpreter;
    use crate::services::testing::StubRoutingService;
    use std::sync::atomic::Ordering;

    fn draft(i: usize) -> StopDraft {
        StopDraft {
            name: Some(format!("Stop {}", i + 1)),
            lat: i as f64,
            lng: 0.0,
            service_minutes: Some(0.0),
            ..Default::default()
        }
    }

    fn session(stub: StubRoutingService, n: usize) -> (Arc<StubRoutingService>, PlanningSession) {
        let stub = Arc::new(stub);
        let mut session =
            PlanningSession::new(stub.clone(), Arc::new(OfflineInterpreter), PlannerSettings::default());
        for i in 0..n {
            session.add_stop(draft(i)).unwrap();
        }
        (stub, session)
    }

    fn triangle() -> StubRoutingService {
        StubRoutingService::from_matrix(&[
            &[0.0, 100.0, 200.0],
            &[100.0, 0.0, 100.0],
            &[200.0, 100.0, 0.0],
        ])
    }

    #[tokio::test]
    async fn test_too_few_stops_is_rejected_before_any_request() {
        let (stub, mut session) = session(StubRoutingService::uniform(1, 60.0), 1);
        let result = session.optimize().await;
        assert!(matches!(result, Err(PlanError::TooFewStops(1))));
        assert_eq!(stub.matrix_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matrix_failure_commits_nothing() {
        let mut stub = triangle();
        stub.fail_matrix = true;
        let (_, mut session) = session(stub, 3);

        assert!(matches!(session.optimize().await, Err(PlanError::Matrix(_))));
        assert!(session.base_route().is_none());
        assert!(session.current_order().is_none());
    }

    #[tokio::test]
    async fn test_geometry_failure_commits_nothing() {
        let mut stub = triangle();
        stub.fail_geometry = true;
        let (_, mut session) = session(stub, 3);

        assert!(matches!(session.optimize().await, Err(PlanError::Route(_))));
        assert!(session.base_route().is_none());
    }

    #[tokio::test]
    async fn test_optimize_commits_base_order_and_whole_route() {
        let (stub, mut session) = session(triangle(), 3);
        let order = session.optimize().await.unwrap().order.clone();

        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(session.current_order(), Some(&[0, 1, 2][..]));
        assert_eq!(stub.geometry_calls.load(Ordering::SeqCst), 1);

        let report = session.report();
        assert_eq!(report.base_order, Some(vec![0, 1, 2]));
        assert!(report.final_order.is_none());
        assert_eq!(report.schedule[0].arrival, "08:00");
        assert_eq!(report.geometry.coordinates.len(), 3);
    }

    #[tokio::test]
    async fn test_apply_rules_needs_a_base_order() {
        let (_, mut session) = session(triangle(), 3);
        assert!(matches!(session.apply_rules().await, Err(PlanError::NoBaseOrder)));
    }

    #[tokio::test]
    async fn test_fallback_rules_steer_final_order_away_from_avoided_road() {
        let (_, mut session) = session(triangle().with_roads(0, 1, 100.0, &["Main Street"]), 3);
        session.optimize().await.unwrap();
        session.save_adhoc_prompt("avoid Main Street");

        let order = session.apply_rules().await.unwrap().order.clone();
        assert_eq!(order, vec![0, 2, 1]);
        assert_eq!(session.current_order(), Some(&[0, 2, 1][..]));
        assert_eq!(session.base_route().map(|r| r.order.clone()), Some(vec![0, 1, 2]));
        assert_eq!(
            session.rules().map(|r| r.avoid_road_names.clone()),
            Some(vec!["Main Street".to_string()])
        );
        assert!(session.avoid_hits().is_empty());

        let report = session.report();
        assert_eq!(report.final_order, Some(vec![0, 2, 1]));
        assert_eq!(report.legs.len(), 2);
    }

    #[tokio::test]
    async fn test_unavoidable_road_is_reported() {
        let stub = StubRoutingService::uniform(2, 100.0).with_roads(0, 1, 100.0, &["Main Street"]);
        let (_, mut session) = session(stub, 2);
        session.optimize().await.unwrap();
        session.save_persistent_prompt("Always avoid Main Street.");
        session.apply_rules().await.unwrap();

        let hits = session.avoid_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].leg, hits[0].from, hits[0].to), (1, 0, 1));
        assert!(session.report().legs[0].uses_avoided_road);
    }

    #[tokio::test]
    async fn test_saving_a_prompt_flushes_the_cache() {
        let (_, mut session) = session(triangle().with_roads(0, 1, 100.0, &["Main Street"]), 3);
        session.optimize().await.unwrap();
        session.save_adhoc_prompt("avoid Main Street");
        session.apply_rules().await.unwrap();
        assert!(!session.cache().is_empty());

        session.save_persistent_prompt("prioritize urgent");
        assert!(session.cache().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_rules_keep_closing_return() {
        let (_, mut session) = session(triangle(), 3);
        session.settings_mut().round_trip = true;
        session.optimize().await.unwrap();
        session.save_adhoc_prompt("avoid Elm Street");

        let route = session.apply_rules().await.unwrap();
        assert_eq!(route.order.first(), Some(&0));
        assert_eq!(route.order.last(), Some(&0));
        assert_eq!(route.order.len(), 4);
        assert_eq!(route.schedule.len(), 4);
    }

    #[tokio::test]
    async fn test_remove_stop_reindexes_and_drops_results() {
        let (_, mut session) = session(StubRoutingService::uniform(4, 60.0), 4);
        session.optimize().await.unwrap();

        let removed = session.remove_stop(1).unwrap();
        assert_eq!(removed.name, "Stop 2");
        let indices: Vec<_> = session.stops().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(session.stops()[1].name, "Stop 3");
        assert!(session.current_order().is_none());
        assert!(matches!(session.remove_stop(7), Err(PlanError::UnknownStop(7))));
    }

    #[tokio::test]
    async fn test_update_stop_validates_and_keeps_index() {
        let (_, mut session) = session(triangle(), 3);
        let mut edit = draft(1);
        edit.urgent = true;
        edit.window_start = Some("09:00".to_string());
        edit.window_end = Some("10:00".to_string());
        session.update_stop(1, edit).unwrap();
        assert!(session.stops()[1].urgent);
        assert_eq!(session.stops()[1].index, 1);

        let mut bad = draft(1);
        bad.window_start = Some("09:00".to_string());
        assert!(matches!(session.update_stop(1, bad), Err(PlanError::InvalidWindow { index: 1 })));
        assert!(matches!(session.update_stop(9, draft(9)), Err(PlanError::UnknownStop(9))));
    }

    #[tokio::test]
    async fn test_moving_a_stop_flushes_the_cache() {
        let (_, mut session) = session(triangle().with_roads(0, 1, 100.0, &["Main Street"]), 3);
        session.optimize().await.unwrap();
        session.save_adhoc_prompt("avoid Main Street");
        session.apply_rules().await.unwrap();
        assert!(!session.cache().is_empty());

        let mut flagged = draft(1);
        flagged.urgent = true;
        session.update_stop(1, flagged).unwrap();
        assert!(!session.cache().is_empty());

        let mut moved = draft(1);
        moved.lng = 0.5;
        session.update_stop(1, moved).unwrap();
        assert!(session.cache().is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_prompts() {
        let (_, mut session) = session(triangle(), 3);
        session.save_adhoc_prompt("avoid Main Street");
        session.optimize().await.unwrap();
        session.clear();

        assert!(session.stops().is_empty());
        assert!(session.current_order().is_none());
        assert!(session.has_rule_text());
        assert_eq!(session.report().stops.len(), 0);
    }

    #[tokio::test]
    async fn test_base_drawing_is_one_whole_route() {
        let (_, mut session) = session(triangle(), 3);
        session.optimize().await.unwrap();
        let base = session.base.as_ref().unwrap();
        assert_eq!(base.drawing.mode, DrawingMode::WholeRoute);
    }
}
