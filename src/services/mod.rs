//! Route planning services

pub mod avoidance;
pub mod clock;
pub mod geo;
pub mod leg_selection;
pub mod order_builder;
pub mod repair;
pub mod road_match;
pub mod routing;
pub mod rules;
pub mod schedule;
pub mod scheduler;
pub mod scoring;
pub mod session;

#[cfg(test)]
pub mod testing;
