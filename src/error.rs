//! Planning errors surfaced to the caller
//!
//! Only input validation and upstream data failures abort a run. Avoidance
//! lookups and rule interpretation degrade to safe defaults and never show up
//! here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Fewer than two stops were supplied.
    #[error("at least 2 stops are required (got {0})")]
    TooFewStops(usize),

    /// A numeric stop field is NaN, infinite or negative.
    #[error("stop {index} has an invalid {field}")]
    InvalidStop { index: usize, field: &'static str },

    /// A time window has only one bound or starts after it ends.
    #[error("stop {index} has an invalid time window")]
    InvalidWindow { index: usize },

    /// A clock string could not be parsed as HH:MM.
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("stop index {0} is out of range")]
    UnknownStop(usize),

    /// Rules were requested before a heuristic order exists.
    #[error("no base order, run the heuristic optimization first")]
    NoBaseOrder,

    /// The travel-time matrix could not be fetched or has the wrong shape.
    #[error("travel-time matrix unavailable: {0:#}")]
    Matrix(anyhow::Error),

    /// No route geometry could be fetched for the order.
    #[error("route geometry unavailable: {0:#}")]
    Route(anyhow::Error),
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;
