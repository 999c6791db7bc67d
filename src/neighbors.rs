//! Great-circle nearest-neighbor search within one window.
//!
//! ## Algorithm
//! 1. Convert every report's latitude/longitude to radians
//! 2. Project onto the unit sphere and bulk-load an R-tree
//! 3. For each report, find its partner: the nearest other report
//!    (or the nearest report of another vessel, per [`NeighborPolicy`])
//! 4. Measure the pair with the haversine formula and keep the closest
//!
//! Chord length on the unit sphere is monotonic in the central angle, so the
//! R-tree's Euclidean ordering is the haversine ordering without any planar
//! approximation.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::config::NeighborPolicy;
use crate::geo_utils::{haversine_angle, to_unit_vector, EARTH_RADIUS_KM};
use crate::window::Window;
use crate::{ClosestPair, PositionReport};

/// A report projected onto the unit sphere, with its index in the window
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub idx: usize,
    pub xyz: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.xyz[0] - point[0];
        let dy = self.xyz[1] - point[1];
        let dz = self.xyz[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Build an R-tree from `[lat, lon]` pairs given in radians.
pub fn build_index(radians: &[[f64; 2]]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = radians
        .iter()
        .enumerate()
        .map(|(i, &[lat, lon])| IndexedPoint {
            idx: i,
            xyz: to_unit_vector(lat, lon),
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// Find the closest pair of distinct vessels in one window.
///
/// Returns the sentinel when the window has fewer than two reports or no
/// report has a partner from another vessel. Among equally close pairs the
/// one found first in report order wins.
pub fn closest_pair_in_window(window: &Window<'_>, policy: NeighborPolicy) -> ClosestPair {
    let reports = window.reports;
    if reports.len() < 2 {
        return ClosestPair::none();
    }

    let radians: Vec<[f64; 2]> = reports
        .iter()
        .map(|r| [r.latitude.to_radians(), r.longitude.to_radians()])
        .collect();
    let tree = build_index(&radians);

    let mut best = ClosestPair::none();
    for (i, report) in reports.iter().enumerate() {
        let [lat, lon] = radians[i];
        let query = to_unit_vector(lat, lon);

        let Some(j) = find_partner(&tree, &query, i, reports, policy) else {
            continue;
        };

        let [other_lat, other_lon] = radians[j];
        let distance_km = haversine_angle(lat, lon, other_lat, other_lon) * EARTH_RADIUS_KM;

        if distance_km < best.distance_km {
            best = ClosestPair::between(report, &reports[j], distance_km, window.start);
        }
    }

    best
}

fn find_partner(
    tree: &RTree<IndexedPoint>,
    query: &[f64; 3],
    i: usize,
    reports: &[PositionReport],
    policy: NeighborPolicy,
) -> Option<usize> {
    let vessel = reports[i].vessel_id;
    match policy {
        NeighborPolicy::SecondNeighbor => {
            // The two nearest points include the query itself (or a duplicate of it)
            let j = tree
                .nearest_neighbor_iter(query)
                .take(2)
                .map(|p| p.idx)
                .find(|&j| j != i)?;
            // Same vessel at another moment is not a rendezvous
            (reports[j].vessel_id != vessel).then_some(j)
        }
        NeighborPolicy::NearestOtherVessel => tree
            .nearest_neighbor_iter(query)
            .map(|p| p.idx)
            .find(|&j| reports[j].vessel_id != vessel),
    }
}
