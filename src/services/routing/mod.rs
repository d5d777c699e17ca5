//! Routing service for travel-time matrices and leg geometry
//!
//! Uses OSRM for production, mock for tests and offline runs.

mod osrm;

pub use osrm::{OsrmClient, OsrmConfig};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::services::geo::{estimated_drive_seconds, haversine_distance};
use crate::types::Coordinates;

/// Pairwise travel durations in seconds
///
/// Unreachable pairs are stored as `f64::INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationMatrix {
    durations: Vec<Vec<f64>>,
    size: usize,
}

impl DurationMatrix {
    pub fn empty() -> Self {
        Self { durations: vec![], size: 0 }
    }

    /// Build from provider rows, `None` meaning unreachable.
    pub fn from_rows(rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let size = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            anyhow::bail!("matrix row {} has {} cells, expected {}", i, row.len(), size);
        }
        let durations = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        Some(s) if s.is_finite() && s >= 0.0 => s,
                        _ => f64::INFINITY,
                    })
                    .collect()
            })
            .collect();
        Ok(Self { durations, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Travel seconds from `from` to `to`; infinite when unknown.
    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.durations
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.duration(from, to).is_finite()
    }
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    /// Create empty geometry (for fallback when no route available)
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Create geometry from a list of coordinates (straight lines)
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords.iter().map(|c| [c.lng, c.lat]).collect(),
        }
    }

    /// Append a leg, dropping its first point when it repeats our last one.
    pub fn append_leg(&mut self, leg: &RouteGeometry) {
        let skip = usize::from(!self.coordinates.is_empty() && !leg.coordinates.is_empty());
        self.coordinates.extend(leg.coordinates.iter().skip(skip).copied());
    }
}

/// One manoeuvre of a route with the road it follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub name: String,
    /// Road reference code such as "I 35E"
    pub reference: Option<String>,
}

impl RouteStep {
    #[cfg(test)]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), reference: None }
    }
}

/// A candidate path between two points
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAlternative {
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub steps: Vec<RouteStep>,
    pub geometry: RouteGeometry,
}

/// Routing service trait for abstraction (OSRM, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Duration matrix for a list of locations, first location is the start
    async fn get_duration_matrix(&self, locations: &[Coordinates]) -> Result<DurationMatrix>;

    /// Candidate paths between two points, fastest first.
    /// With `alternatives = false` at most one path is returned.
    async fn get_leg_routes(
        &self,
        from: &Coordinates,
        to: &Coordinates,
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>>;

    /// Geometry of a single path through all locations in order
    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Mock routing service for tests and offline use
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 40)
    average_speed_kmh: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }

    fn drive_seconds(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        estimated_drive_seconds(from, to, self.road_coefficient, self.average_speed_kmh)
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn get_duration_matrix(&self, locations: &[Coordinates]) -> Result<DurationMatrix> {
        let rows = locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| Some(self.drive_seconds(from, to)))
                    .collect()
            })
            .collect();
        DurationMatrix::from_rows(rows)
    }

    async fn get_leg_routes(
        &self,
        from: &Coordinates,
        to: &Coordinates,
        _alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        Ok(vec![RouteAlternative {
            duration_seconds: self.drive_seconds(from, to),
            distance_meters: haversine_distance(from, to) * self.road_coefficient * 1000.0,
            steps: vec![],
            geometry: RouteGeometry::from_coordinates(&[*from, *to]),
        }])
    }

    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry> {
        Ok(RouteGeometry::from_coordinates(locations))
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service based on configuration
pub fn create_routing_service(config: Option<OsrmConfig>) -> Result<Box<dyn RoutingService>> {
    match config {
        Some(cfg) => {
            info!("Using OSRM routing service at {}", cfg.base_url);
            Ok(Box::new(OsrmClient::new(cfg)?))
        }
        None => {
            info!("Using mock routing service (OSRM not configured)");
            Ok(Box::new(MockRoutingService::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dallas() -> Coordinates {
        Coordinates { lat: 32.7767, lng: -96.7970 }
    }

    fn fort_worth() -> Coordinates {
        Coordinates { lat: 32.7555, lng: -97.3308 }
    }

    fn plano() -> Coordinates {
        Coordinates { lat: 33.0198, lng: -96.6989 }
    }

    #[test]
    fn test_matrix_marks_missing_cells_unreachable() {
        let matrix = DurationMatrix::from_rows(vec![
            vec![Some(0.0), None],
            vec![Some(12.5), Some(f64::NAN)],
        ])
        .unwrap();

        assert_eq!(matrix.size(), 2);
        assert!(!matrix.is_reachable(0, 1));
        assert_eq!(matrix.duration(1, 0), 12.5);
        assert!(!matrix.is_reachable(1, 1));
        assert!(matrix.duration(5, 0).is_infinite());
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let result = DurationMatrix::from_rows(vec![vec![Some(0.0), Some(1.0)], vec![Some(1.0)]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_append_leg_skips_join_point() {
        let mut geometry = RouteGeometry::empty();
        geometry.append_leg(&RouteGeometry { coordinates: vec![[0.0, 0.0], [1.0, 1.0]] });
        geometry.append_leg(&RouteGeometry { coordinates: vec![[1.0, 1.0], [2.0, 2.0]] });
        assert_eq!(geometry.coordinates, vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_mock_matrix_three_locations() {
        let service = MockRoutingService::new();
        let matrix = service
            .get_duration_matrix(&[dallas(), fort_worth(), plano()])
            .await
            .unwrap();

        assert_eq!(matrix.size(), 3);
        for i in 0..3 {
            assert_eq!(matrix.duration(i, i), 0.0);
            for j in 0..3 {
                if i != j {
                    assert!(matrix.duration(i, j) > 0.0);
                }
            }
        }
        assert!((matrix.duration(0, 1) - matrix.duration(1, 0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mock_matrix_travel_time_reasonable() {
        let service = MockRoutingService::new();
        let matrix = service.get_duration_matrix(&[dallas(), fort_worth()]).await.unwrap();

        // ~50 km × 1.3 at 40 km/h ≈ 1.6 hours
        let hours = matrix.duration(0, 1) / 3600.0;
        assert!(hours > 1.3 && hours < 1.9, "Expected ~1.6 hours, got {}", hours);
    }

    #[tokio::test]
    async fn test_mock_leg_is_straight_line() {
        let service = MockRoutingService::with_params(1.0, 60.0);
        let routes = service.get_leg_routes(&dallas(), &plano(), true).await.unwrap();

        assert_eq!(routes.len(), 1);
        assert!(routes[0].steps.is_empty());
        assert_eq!(routes[0].geometry.coordinates.len(), 2);
        assert_eq!(routes[0].geometry.coordinates[0], [-96.7970, 32.7767]);
    }

    #[test]
    fn test_routing_service_name() {
        assert_eq!(MockRoutingService::new().name(), "MockRouting");
    }

    #[test]
    fn test_create_routing_service_without_config_is_mock() {
        let service = create_routing_service(None).unwrap();
        assert_eq!(service.name(), "MockRouting");
    }
}
