//! Order, schedule and report types

use serde::{Deserialize, Serialize};

use super::{RuleSet, Stop};
use crate::services::clock::format_hhmm;
use crate::services::leg_selection::{LegSelection, RouteDrawing};
use crate::services::routing::RouteGeometry;

/// Timing of one visit, seconds since midnight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub stop_index: usize,
    pub arrival: f64,
    pub service_start: f64,
    pub departure: f64,
    /// Service applied at this visit; zero for the closing return to start
    pub service_seconds: f64,
    pub feasible: bool,
}

/// A visiting order with its schedule, aligned 1:1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    pub order: Vec<usize>,
    pub schedule: Vec<ScheduleEntry>,
}

impl PlannedRoute {
    /// Whether the order returns to its first stop.
    pub fn is_round_trip(&self) -> bool {
        self.order.len() > 1 && self.order.first() == self.order.last()
    }

    /// Number of stops that miss their window.
    pub fn infeasible_count(&self) -> usize {
        self.schedule.iter().filter(|e| !e.feasible).count()
    }
}

/// A leg of the final order that still uses an avoided road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidHit {
    /// 1-based leg number
    pub leg: usize,
    pub from: usize,
    pub to: usize,
    pub from_name: String,
    pub to_name: String,
}

/// Schedule row with clock strings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub stop_index: usize,
    pub name: String,
    pub urgent: bool,
    pub arrival: String,
    pub service_start: String,
    pub departure: String,
    pub feasible: bool,
}

/// Everything a caller needs to display a planned route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub stops: Vec<Stop>,
    pub base_order: Option<Vec<usize>>,
    pub final_order: Option<Vec<usize>>,
    pub schedule: Vec<ReportEntry>,
    pub rules: Option<RuleSet>,
    pub legs: Vec<LegSelection>,
    pub avoid_hits: Vec<AvoidHit>,
    pub geometry: RouteGeometry,
}

impl PlanReport {
    pub fn build(
        stops: &[Stop],
        base: Option<&PlannedRoute>,
        final_route: Option<&PlannedRoute>,
        rules: Option<&RuleSet>,
        drawing: Option<&RouteDrawing>,
        avoid_hits: &[AvoidHit],
    ) -> Self {
        let shown = final_route.or(base);
        let schedule = shown
            .map(|route| {
                route
                    .schedule
                    .iter()
                    .filter_map(|entry| {
                        let stop = stops.get(entry.stop_index)?;
                        Some(ReportEntry {
                            stop_index: entry.stop_index,
                            name: stop.name.clone(),
                            urgent: stop.urgent,
                            arrival: format_hhmm(entry.arrival),
                            service_start: format_hhmm(entry.service_start),
                            departure: format_hhmm(entry.departure),
                            feasible: entry.feasible,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            stops: stops.to_vec(),
            base_order: base.map(|r| r.order.clone()),
            final_order: final_route.map(|r| r.order.clone()),
            schedule,
            rules: rules.cloned(),
            legs: drawing.map(|d| d.legs.clone()).unwrap_or_default(),
            avoid_hits: avoid_hits.to_vec(),
            geometry: drawing
                .map(|d| d.geometry.clone())
                .unwrap_or_else(RouteGeometry::empty),
        }
    }
}
