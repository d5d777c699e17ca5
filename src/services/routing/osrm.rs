//! OSRM routing engine client
//!
//! OSRM HTTP API documentation:
//! http://project-osrm.org/docs/v5.24.0/api/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DurationMatrix, RouteAlternative, RouteGeometry, RouteStep, RoutingService};
use crate::types::Coordinates;

/// OSRM client configuration
#[derive(Debug, Clone)]
pub struct OsrmConfig {
    /// Base URL of OSRM server (e.g., "https://router.project-osrm.org")
    pub base_url: String,
    /// Routing profile segment of the URL
    pub profile: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl OsrmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// OSRM routing client
pub struct OsrmClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// OSRM takes `lng,lat` pairs joined by `;`
    fn coordinate_path(locations: &[Coordinates]) -> String {
        locations
            .iter()
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn table_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/table/v1/{}/{}?annotations=duration",
            self.config.base_url,
            self.config.profile,
            Self::coordinate_path(locations)
        )
    }

    fn leg_url(&self, from: &Coordinates, to: &Coordinates, alternatives: bool) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&steps=true&alternatives={}&geometries=geojson",
            self.config.base_url,
            self.config.profile,
            Self::coordinate_path(&[*from, *to]),
            alternatives
        )
    }

    fn route_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.config.base_url,
            self.config.profile,
            Self::coordinate_path(locations)
        )
    }

    async fn fetch_routes(&self, url: &str) -> Result<Vec<OsrmRoute>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send route request to OSRM")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OSRM route returned error {}: {}", status, body);
        }

        let route_response: RouteResponse = response
            .json()
            .await
            .context("Failed to parse OSRM route response")?;

        if route_response.code != "Ok" {
            anyhow::bail!("OSRM route returned code {}", route_response.code);
        }

        Ok(route_response.routes)
    }
}

#[async_trait]
impl RoutingService for OsrmClient {
    async fn get_duration_matrix(&self, locations: &[Coordinates]) -> Result<DurationMatrix> {
        let n = locations.len();

        if n == 0 {
            return Ok(DurationMatrix::empty());
        }

        if n == 1 {
            return DurationMatrix::from_rows(vec![vec![Some(0.0)]]);
        }

        let url = self.table_url(locations);
        debug!("Requesting duration matrix from OSRM for {} locations", n);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send table request to OSRM")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OSRM table returned error {}: {}", status, body);
        }

        let table: TableResponse = response
            .json()
            .await
            .context("Failed to parse OSRM table response")?;

        if table.code != "Ok" {
            anyhow::bail!("OSRM table returned code {}", table.code);
        }

        let matrix = DurationMatrix::from_rows(table.durations)?;
        if matrix.size() != n {
            anyhow::bail!("OSRM table has {} rows for {} locations", matrix.size(), n);
        }

        debug!("Received duration matrix from OSRM: {}x{}", n, n);
        Ok(matrix)
    }

    async fn get_leg_routes(
        &self,
        from: &Coordinates,
        to: &Coordinates,
        alternatives: bool,
    ) -> Result<Vec<RouteAlternative>> {
        let routes = self.fetch_routes(&self.leg_url(from, to, alternatives)).await?;
        let mut candidates: Vec<RouteAlternative> =
            routes.into_iter().map(RouteAlternative::from).collect();
        if !alternatives {
            candidates.truncate(1);
        }
        Ok(candidates)
    }

    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry> {
        if locations.len() < 2 {
            return Ok(RouteGeometry::empty());
        }

        debug!("Requesting route geometry from OSRM for {} locations", locations.len());

        let routes = self.fetch_routes(&self.route_url(locations)).await?;
        let route = routes.into_iter().next().context("OSRM returned no route")?;

        debug!("Received route geometry with {} points", route.geometry.coordinates.len());
        Ok(RouteGeometry { coordinates: route.geometry.coordinates })
    }

    fn name(&self) -> &str {
        "OSRM"
    }
}

// OSRM API types

#[derive(Debug, Deserialize)]
struct TableResponse {
    code: String,
    #[serde(default)]
    durations: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    distance: f64,
    geometry: GeoJsonLine,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonLine {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    #[serde(default)]
    name: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

impl From<OsrmRoute> for RouteAlternative {
    fn from(route: OsrmRoute) -> Self {
        let steps = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|s| RouteStep { name: s.name, reference: s.reference })
            .collect();
        Self {
            duration_seconds: route.duration,
            distance_meters: route.distance,
            steps,
            geometry: RouteGeometry { coordinates: route.geometry.coordinates },
        }
    }
}
