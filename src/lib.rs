//! Stopwise - route-ordering engine for urgent and time-windowed stops
//!
//! - [`services::order_builder`]: base nearest-feasible-next order
//! - [`services::scheduler`]: rule-weighted order with road avoidance
//! - [`services::repair`]: local repair of avoided legs
//! - [`services::session`]: stop editing and planning runs

pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod services;
pub mod types;
