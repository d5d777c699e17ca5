//! Stop types

use serde::{Deserialize, Serialize};

use crate::defaults::DEFAULT_SERVICE_MINUTES;
use crate::error::{PlanError, PlanResult};
use crate::services::clock::parse_hhmm;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Arrival window in seconds since midnight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Seconds spent waiting when arriving at `arrival`.
    pub fn wait(&self, arrival: f64) -> f64 {
        (self.start - arrival).max(0.0)
    }

    /// Seconds past the window end when service starts at `service_start`.
    pub fn lateness(&self, service_start: f64) -> f64 {
        (service_start - self.end).max(0.0)
    }
}

/// A stop placed by the user
///
/// `index` is the stop's position in the session and is the key used by the
/// duration matrix, orders and the avoidance cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub index: usize,
    pub name: String,
    pub coordinates: Coordinates,
    pub service_seconds: f64,
    pub urgent: bool,
    pub time_window: Option<TimeWindow>,
}

impl Stop {
    /// Earliest service start when arriving at `arrival`.
    pub fn service_start(&self, arrival: f64) -> f64 {
        match self.time_window {
            Some(tw) => arrival.max(tw.start),
            None => arrival,
        }
    }

    /// Reject non-finite fields and malformed windows.
    pub fn validate(&self) -> PlanResult<()> {
        let index = self.index;
        if !self.coordinates.lat.is_finite() || !self.coordinates.lng.is_finite() {
            return Err(PlanError::InvalidStop { index, field: "coordinate" });
        }
        if !self.service_seconds.is_finite() || self.service_seconds < 0.0 {
            return Err(PlanError::InvalidStop { index, field: "service duration" });
        }
        if let Some(tw) = self.time_window {
            if !tw.start.is_finite() || !tw.end.is_finite() || tw.start > tw.end {
                return Err(PlanError::InvalidWindow { index });
            }
        }
        Ok(())
    }
}

/// Stop as supplied in a stops file or by an editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDraft {
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub service_minutes: Option<f64>,
    #[serde(default)]
    pub urgent: bool,
    /// HH:MM
    #[serde(default)]
    pub window_start: Option<String>,
    /// HH:MM
    #[serde(default)]
    pub window_end: Option<String>,
}

impl StopDraft {
    /// Turn the draft into a stop at position `index`.
    ///
    /// Service minutes are clamped at zero like the editor does; the window
    /// needs both bounds or neither.
    pub fn into_stop(self, index: usize) -> PlanResult<Stop> {
        let time_window = match (self.window_start.as_deref(), self.window_end.as_deref()) {
            (None, None) => None,
            (Some(start), Some(end)) => Some(TimeWindow {
                start: parse_hhmm(start)?,
                end: parse_hhmm(end)?,
            }),
            _ => return Err(PlanError::InvalidWindow { index }),
        };

        let minutes = self.service_minutes.unwrap_or(DEFAULT_SERVICE_MINUTES);
        let stop = Stop {
            index,
            name: self.name.unwrap_or_else(|| format!("Stop {}", index + 1)),
            coordinates: Coordinates { lat: self.lat, lng: self.lng },
            service_seconds: if minutes.is_finite() { minutes.max(0.0) * 60.0 } else { minutes },
            urgent: self.urgent,
            time_window,
        };
        stop.validate()?;
        Ok(stop)
    }
}
