//! Per-leg path selection for the committed order
//!
//! With rules, every leg asks for alternative paths and keeps the one with the
//! lowest `duration + avoid penalty`. Without rules, or when no leg produced a
//! path, the whole order is drawn with a single route request.

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::services::avoidance::LegAvoidance;
use crate::services::road_match::RoadMatcher;
use crate::services::routing::{RouteAlternative, RouteGeometry, RoutingService};
use crate::types::{AvoidHit, RuleSet, Stop};

/// How the route geometry was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawingMode {
    PerLegAlternatives,
    WholeRoute,
}

/// Chosen path for one leg of the order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSelection {
    pub from: usize,
    pub to: usize,
    pub duration_seconds: f64,
    pub uses_avoided_road: bool,
    /// Duration plus the avoid penalty when an avoided road is used
    pub score: f64,
    /// Number of alternatives the provider offered
    pub alternatives: usize,
    #[serde(skip)]
    pub geometry: RouteGeometry,
}

/// Geometry of the whole order plus the per-leg choices behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDrawing {
    pub mode: DrawingMode,
    pub legs: Vec<LegSelection>,
    pub geometry: RouteGeometry,
}

/// Score one alternative under `rules`.
pub fn alternative_score(
    route: &RouteAlternative,
    rules: &RuleSet,
    matcher: &RoadMatcher,
) -> (f64, bool) {
    let uses = matcher.uses_avoided(&route.steps, &rules.avoid_road_names);
    let penalty = if uses { rules.weights.avoid_road_penalty } else { 0.0 };
    (route.duration_seconds + penalty, uses)
}

/// Lowest-scoring alternative between two stops.
pub async fn best_leg(
    routing: &dyn RoutingService,
    matcher: &RoadMatcher,
    from: &Stop,
    to: &Stop,
    rules: &RuleSet,
) -> Result<LegSelection> {
    let routes = routing
        .get_leg_routes(&from.coordinates, &to.coordinates, true)
        .await
        .with_context(|| format!("alternatives {} -> {} failed", from.index, to.index))?;

    let mut best: Option<(f64, bool, &RouteAlternative)> = None;
    for route in &routes {
        let (score, uses) = alternative_score(route, rules, matcher);
        if best.map_or(true, |(s, _, _)| score < s) {
            best = Some((score, uses, route));
        }
    }
    let (score, uses, route) =
        best.with_context(|| format!("no path {} -> {}", from.index, to.index))?;

    Ok(LegSelection {
        from: from.index,
        to: to.index,
        duration_seconds: route.duration_seconds,
        uses_avoided_road: uses,
        score,
        alternatives: routes.len(),
        geometry: route.geometry.clone(),
    })
}

/// Draw `order`, per leg when rules are given.
pub async fn select_leg_geometries(
    order: &[usize],
    stops: &[Stop],
    rules: Option<&RuleSet>,
    routing: &dyn RoutingService,
    matcher: &RoadMatcher,
) -> Result<RouteDrawing> {
    if let Some(rules) = rules {
        let legs = join_all(order.windows(2).filter_map(|pair| {
            let (a, b) = (stops.get(pair[0])?, stops.get(pair[1])?);
            Some(async move { best_leg(routing, matcher, a, b, rules).await })
        }))
        .await;

        let mut selected = Vec::with_capacity(legs.len());
        for leg in legs {
            match leg {
                Ok(leg) => selected.push(leg),
                Err(e) => warn!("Skipping leg geometry: {:#}", e),
            }
        }

        if !selected.is_empty() {
            let mut geometry = RouteGeometry::empty();
            for leg in &selected {
                geometry.append_leg(&leg.geometry);
            }
            info!(
                "Selected {} leg paths, {} still on avoided roads",
                selected.len(),
                selected.iter().filter(|l| l.uses_avoided_road).count()
            );
            return Ok(RouteDrawing {
                mode: DrawingMode::PerLegAlternatives,
                legs: selected,
                geometry,
            });
        }
        debug!("No per-leg paths available, drawing the whole route");
    }

    let coordinates: Vec<_> = order
        .iter()
        .filter_map(|&i| stops.get(i).map(|s| s.coordinates))
        .collect();
    let geometry = routing
        .get_route_geometry(&coordinates)
        .await
        .context("whole-route geometry failed")?;

    Ok(RouteDrawing {
        mode: DrawingMode::WholeRoute,
        legs: vec![],
        geometry,
    })
}

/// Legs of `order` whose best-known path still uses an avoided road.
pub async fn avoid_hits(order: &[usize], avoidance: &LegAvoidance, avoid: &[String]) -> Vec<AvoidHit> {
    if avoid.is_empty() {
        return vec![];
    }
    let stops = avoidance.stops();
    let checks = join_all(order.windows(2).map(|pair| {
        let (from, to) = (pair[0], pair[1]);
        async move { (from, to, avoidance.uses_avoided_road(from, to, avoid).await) }
    }))
    .await;

    checks
        .into_iter()
        .enumerate()
        .filter_map(|(k, (from, to, result))| match result {
            Ok(true) => Some(AvoidHit {
                leg: k + 1,
                from,
                to,
                from_name: stops.get(from).map(|s| s.name.clone()).unwrap_or_default(),
                to_name: stops.get(to).map(|s| s.name.clone()).unwrap_or_default(),
            }),
            Ok(false) => None,
            Err(e) => {
                debug!("Avoid hit check skipped: {:#}", e);
                None
            }
        })
        .collect()
}
