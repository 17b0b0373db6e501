use crate::geometry::{Point, centroid};
use crate::route_registry::RouteId;
use log::debug;

/// One stop of one route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopInstance {
    pub route: RouteId,
    /// Display index of the route, see `Route::index`.
    pub route_index: usize,
    pub position: Point,
}

/// Stops of different routes treated as the same place on the map.
#[derive(Debug, Clone)]
pub struct TransitStopGroup {
    pub stops: Vec<StopInstance>,
}

impl TransitStopGroup {
    pub fn new(stop: StopInstance) -> Self {
        Self { stops: vec![stop] }
    }

    /// Mean position of the members. `None` only for an empty group.
    pub fn centroid(&self) -> Option<Point> {
        centroid(self.stops.iter().map(|s| &s.position))
    }

    pub fn is_within(&self, point: &Point, threshold: f64) -> bool {
        self.centroid()
            .is_some_and(|c| c.distance_to(point) < threshold)
    }
}

/// Greedy clustering of stops whose positions are within `threshold` of a
/// group's centroid.
///
/// Each stop joins the first group whose current centroid is close enough,
/// otherwise it starts its own group. Groups with close centroids are then
/// merged until no pair is left within the threshold. The result depends on
/// input order. Members end up sorted by route index with at most one entry
/// per route.
pub fn group_stops(stops: &[StopInstance], threshold: f64) -> Vec<TransitStopGroup> {
    let mut groups: Vec<TransitStopGroup> = Vec::new();

    for stop in stops {
        match groups
            .iter_mut()
            .find(|group| group.is_within(&stop.position, threshold))
        {
            Some(group) => group.stops.push(*stop),
            None => groups.push(TransitStopGroup::new(*stop)),
        }
    }

    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut merged = false;
        let mut i = 0;
        while i < groups.len() {
            let mut j = i + 1;
            while j < groups.len() {
                let close = groups[j]
                    .centroid()
                    .is_some_and(|c| groups[i].is_within(&c, threshold));
                if close {
                    let absorbed = groups.remove(j);
                    groups[i].stops.extend(absorbed.stops);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged {
            break;
        }
    }

    for group in &mut groups {
        group.stops.sort_by_key(|s| s.route_index);
        group.stops.dedup_by_key(|s| s.route_index);
    }

    debug!(
        "Grouped {} stops into {} groups ({} merge sweeps)",
        stops.len(),
        groups.len(),
        sweeps
    );

    groups
}
