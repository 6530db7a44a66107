//! Greedy nearest-unvisited ordering of delivery stops.
//!
//! Candidates are ranked by straight-line distance in degree space, which is only a
//! proxy. The leg shown for each stop comes from the routing provider. Queries are
//! issued one at a time, in visit order.

use crate::sdk::location::{Coordinate, LegStats, Location};
use crate::sdk::routing::route::leg_stats;
use crate::sdk::routing::service::RouteProvider;

/// Orders `destinations` starting from `base` and annotates each stop with the leg
/// from its predecessor.
///
/// Never fails. Without base coordinates the input comes back untouched. A stop
/// without coordinates is kept and gets the sentinel leg, and a failed provider query
/// only blanks that one leg.
pub async fn sequence<P>(provider: &P, base: &Location, destinations: Vec<Location>) -> Vec<Location>
where
    P: RouteProvider + ?Sized,
{
    let Some(start) = base.coordinates else {
        log::debug!(
            "Base \"{}\" has no coordinates, keeping {} stops as given",
            base.name,
            destinations.len()
        );
        return destinations;
    };

    let mut current = start;
    let mut unvisited = destinations;
    let mut ordered = Vec::with_capacity(unvisited.len());

    while !unvisited.is_empty() {
        let idx = nearest_index(&current, &unvisited);
        let mut next = unvisited.remove(idx);

        let leg = match next.coordinates {
            Some(target) => query_leg(provider, current, target, &next.name).await,
            None => {
                log::warn!("Stop \"{}\" has no coordinates, leg left unknown", next.name);
                LegStats::unavailable()
            }
        };
        next.leg = Some(leg);

        if let Some(target) = next.coordinates {
            current = target;
        }
        ordered.push(next);
    }

    ordered
}

/// Index of the positioned candidate closest to `from`. The first one seen wins ties.
/// Falls back to index 0 when no candidate has coordinates.
pub fn nearest_index(from: &Coordinate, candidates: &[Location]) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let Some(coord) = candidate.coordinates else {
            continue;
        };
        let distance = from.proxy_distance(&coord);
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map_or(0, |(idx, _)| idx)
}

async fn query_leg<P>(provider: &P, from: Coordinate, to: Coordinate, name: &str) -> LegStats
where
    P: RouteProvider + ?Sized,
{
    let result = provider.get_directions(from, to).await;
    if let Err(err) = &result {
        log::warn!("Leg query to \"{}\" failed: {}", name, err);
    }
    leg_stats(result)
}
