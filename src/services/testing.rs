//! Deterministic provider stubs shared by the planner tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::services::routing::{
    DurationMatrix, RouteAlternative, RouteGeometry, RouteStep, RoutingService,
};
use crate::types::{Coordinates, Stop, TimeWindow};

/// Coordinates of stub stop `index`; the stub maps them back to the index.
pub fn stub_coordinates(index: usize) -> Coordinates {
    Coordinates { lat: index as f64, lng: 0.0 }
}

/// `n` plain stops with no service time, no window, not urgent.
pub fn stub_stops(n: usize) -> Vec<Stop> {
    (0..n).map(|i| stub_stop(i, false, None, 0.0)).collect()
}

pub fn stub_stop(index: usize, urgent: bool, window: Option<(f64, f64)>, service_seconds: f64) -> Stop {
    Stop {
        index,
        name: format!("Stop {}", index + 1),
        coordinates: stub_coordinates(index),
        service_seconds,
        urgent,
        time_window: window.map(|(start, end)| TimeWindow { start, end }),
    }
}

pub fn matrix(rows: &[&[f64]]) -> DurationMatrix {
    DurationMatrix::from_rows(rows.iter().map(|r| r.iter().map(|&v| Some(v)).collect()).collect())
        .expect("square test matrix")
}

/// Routing stub with per-leg alternatives and call counters
pub struct StubRoutingService {
    durations: Vec<Vec<Option<f64>>>,
    legs: HashMap<(usize, usize), Vec<RouteAlternative>>,
    failing: HashSet<(usize, usize)>,
    pub fail_matrix: bool,
    pub fail_geometry: bool,
    pub matrix_calls: AtomicUsize,
    pub leg_calls: AtomicUsize,
    pub geometry_calls: AtomicUsize,
}

impl StubRoutingService {
    pub fn new(durations: Vec<Vec<Option<f64>>>) -> Self {
        Self {
            durations,
            legs: HashMap::new(),
            failing: HashSet::new(),
            fail_matrix: false,
            fail_geometry: false,
            matrix_calls: AtomicUsize::new(0),
            leg_calls: AtomicUsize::new(0),
            geometry_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_matrix(rows: &[&[f64]]) -> Self {
        Self::new(rows.iter().map(|r| r.iter().map(|&v| Some(v)).collect()).collect())
    }

    /// Every pair of distinct stops `seconds` apart.
    pub fn uniform(n: usize, seconds: f64) -> Self {
        Self::new(
            (0..n)
                .map(|i| (0..n).map(|j| Some(if i == j { 0.0 } else { seconds })).collect())
                .collect(),
        )
    }

    pub fn size(&self) -> usize {
        self.durations.len()
    }

    /// The matrix this stub answers with.
    pub fn duration_matrix(&self) -> DurationMatrix {
        DurationMatrix::from_rows(self.durations.clone()).expect("square stub matrix")
    }

    /// Single path for the leg running over the named roads.
    pub fn with_roads(self, from: usize, to: usize, seconds: f64, roads: &[&str]) -> Self {
        self.with_alternatives(from, to, vec![alternative(from, to, seconds, roads)])
    }

    pub fn with_alternatives(mut self, from: usize, to: usize, routes: Vec<RouteAlternative>) -> Self {
        self.legs.insert((from, to), routes);
        self
    }

    pub fn failing_leg(mut self, from: usize, to: usize) -> Self {
        self.failing.insert((from, to));
        self
    }

    fn index_of(&self, c: &Coordinates) -> Option<usize> {
        (0..self.size()).find(|&i| stub_coordinates(i) == *c)
    }
}

/// Path between stub stops with a two-point geometry.
pub fn alternative(from: usize, to: usize, seconds: f64, roads: &[&str]) -> RouteAlternative {
    RouteAlternative {
        duration_seconds: seconds,
        distance_meters: seconds * 10.0,
        steps: roads.iter().map(|r| RouteStep::named(*r)).collect(),
        geometry: RouteGeometry::from_coordinates(&[stub_coordinates(from), stub_coordinates(to)]),
    }
}

#[async_trait]
impl RoutingService for StubRoutingService {
    async fn get_duration_matrix(&self, locations: &[Coordinates]) -> Result<DurationMatrix> {
        self.matrix_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_matrix {
            anyhow::bail!("stub matrix failure");
        }
        anyhow::ensure!(locations.len() == self.size(), "unexpected location count");
        DurationMatrix::from_rows(self.durations.clone())
    }

    async fn get_leg_routes(
        &self,
        from: &Coordinates,
        to: &Coordinates,
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        self.leg_calls.fetch_add(1, Ordering::SeqCst);
        let (Some(a), Some(b)) = (self.index_of(from), self.index_of(to)) else {
            anyhow::bail!("unknown stub coordinates");
        };
        if self.failing.contains(&(a, b)) {
            anyhow::bail!("stub leg failure {} -> {}", a, b);
        }
        let mut routes = match self.legs.get(&(a, b)) {
            Some(routes) => routes.clone(),
            None => {
                let seconds = self.durations[a][b].unwrap_or(f64::INFINITY);
                vec![alternative(a, b, seconds, &[])]
            }
        };
        if !alternatives {
            routes.truncate(1);
        }
        Ok(routes)
    }

    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry> {
        self.geometry_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_geometry {
            anyhow::bail!("stub geometry failure");
        }
        Ok(RouteGeometry::from_coordinates(locations))
    }

    fn name(&self) -> &str {
        "StubRouting"
    }
}
