//! Sequential schedule computation for a fixed visiting order.
//!
//! Walks the order from its first stop and computes arrival, service start
//! and departure for every visit. This does NOT re-optimise the order; it is
//! the recalculation used after the order builder, the rule scheduler and the
//! repair pass so that every committed order carries a matching schedule.

use crate::services::routing::DurationMatrix;
use crate::types::{ScheduleEntry, Stop};

/// Compute the schedule for `order` starting at `start_time`.
///
/// The first stop is left at `start_time` (or its window start) after its own
/// service. A final repeat of the first stop is the return leg of a round
/// trip: it gets an arrival with no service and is always feasible.
pub fn compute_schedule(
    order: &[usize],
    stops: &[Stop],
    matrix: &DurationMatrix,
    start_time: f64,
) -> Vec<ScheduleEntry> {
    let mut entries: Vec<ScheduleEntry> = Vec::with_capacity(order.len());
    let closes_loop = order.len() > 1 && order.first() == order.last();

    let mut clock = start_time;
    let mut prev: Option<usize> = None;

    for (position, &index) in order.iter().enumerate() {
        let Some(stop) = stops.get(index) else {
            continue;
        };
        let travel = prev.map_or(0.0, |p| matrix.duration(p, index));
        let arrival = clock + travel;

        let entry = if closes_loop && position == order.len() - 1 {
            ScheduleEntry {
                stop_index: index,
                arrival,
                service_start: arrival,
                departure: arrival,
                service_seconds: 0.0,
                feasible: true,
            }
        } else {
            visit(stop, arrival)
        };

        clock = entry.departure;
        prev = Some(index);
        entries.push(entry);
    }

    entries
}

/// Schedule entry for serving `stop` after arriving at `arrival`.
pub fn visit(stop: &Stop, arrival: f64) -> ScheduleEntry {
    let service_start = stop.service_start(arrival);
    let feasible = stop.time_window.map_or(true, |tw| service_start <= tw.end);
    ScheduleEntry {
        stop_index: stop.index,
        arrival,
        service_start,
        departure: service_start + stop.service_seconds,
        service_seconds: stop.service_seconds,
        feasible,
    }
}
