//! Geographic utilities.
//!
//! All distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`].

use crate::config::Geofence;
use crate::{GeoPoint, PositionReport};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Central angle in radians between two points given in radians.
pub fn haversine_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    angle_from(lat1, lat1.cos(), lon1, lat2, lon2)
}

/// Haversine angle with the first point's cosine of latitude supplied, so a
/// fixed origin pays for its trigonometry once.
fn angle_from(lat1: f64, cos_lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + cos_lat1 * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two points in kilometers.
///
/// # Example
/// ```
/// use vessel_rendezvous::GeoPoint;
/// use vessel_rendezvous::geo_utils::haversine_km;
///
/// let copenhagen = GeoPoint::new(55.6761, 12.5683);
/// let ronne = GeoPoint::new(55.1000, 14.7000);
/// let d = haversine_km(&copenhagen, &ronne);
/// assert!(d > 140.0 && d < 160.0);
/// ```
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    EARTH_RADIUS_KM
        * haversine_angle(
            a.latitude.to_radians(),
            a.longitude.to_radians(),
            b.latitude.to_radians(),
            b.longitude.to_radians(),
        )
}

/// Test whether a point lies inside a circle. The boundary is included.
pub fn within_circle(point: &GeoPoint, center: &GeoPoint, radius_km: f64) -> bool {
    haversine_km(center, point) <= radius_km
}

/// Drop every report outside the geofence, in place.
///
/// The center's trigonometry is computed once for the whole batch.
pub fn retain_within_circle(reports: &mut Vec<PositionReport>, geofence: &Geofence) {
    let center_lat = geofence.center.latitude.to_radians();
    let center_lon = geofence.center.longitude.to_radians();
    let center_cos = center_lat.cos();

    reports.retain(|r| {
        let angle = angle_from(
            center_lat,
            center_cos,
            center_lon,
            r.latitude.to_radians(),
            r.longitude.to_radians(),
        );
        EARTH_RADIUS_KM * angle <= geofence.radius_km
    });
}

/// Project a point given in radians onto the unit sphere.
///
/// Straight-line (chord) distance between projected points grows
/// monotonically with the great-circle angle, so a Euclidean nearest
/// neighbor in 3-D is also the haversine nearest neighbor.
pub fn to_unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let cos_lat = lat.cos();
    [cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_center_is_inside_at_zero_radius() {
        let center = GeoPoint::new(55.225, 14.245);
        assert_eq!(haversine_km(&center, &center), 0.0);
        assert!(within_circle(&center, &center, 0.0));
        assert!(within_circle(&center, &center, f64::MIN_POSITIVE));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = GeoPoint::new(55.225, 14.245);
        let point = GeoPoint::new(55.6, 14.245);
        let d = haversine_km(&center, &point);
        assert!(within_circle(&point, &center, d));
        assert!(!within_circle(&point, &center, d - 1e-9));
    }

    #[test]
    fn test_known_distance() {
        // One degree of latitude
        let a = GeoPoint::new(55.0, 14.0);
        let b = GeoPoint::new(56.0, 14.0);
        let expected = EARTH_RADIUS_KM * 1.0_f64.to_radians();
        assert!((haversine_km(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_pair_distance() {
        let a = GeoPoint::new(55.2250, 14.2450);
        let b = GeoPoint::new(55.2251, 14.2451);
        let d = haversine_km(&a, &b);
        assert!((d - 0.0128).abs() < 0.0005, "got {}", d);
    }

    #[test]
    fn test_retain_matches_within_circle() {
        let geofence = Geofence::default();
        let ts = NaiveDateTime::default();
        let points = [
            GeoPoint::new(55.225, 14.245),
            GeoPoint::new(55.5, 14.5),
            GeoPoint::new(55.9, 14.245),
            GeoPoint::new(54.0, 12.0),
            GeoPoint::new(55.225, 15.5),
        ];
        let mut reports: Vec<PositionReport> = points
            .iter()
            .enumerate()
            .map(|(i, p)| PositionReport::new(i as u64, ts, p.latitude, p.longitude, 5.0))
            .collect();

        retain_within_circle(&mut reports, &geofence);

        let expected: Vec<u64> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| within_circle(p, &geofence.center, geofence.radius_km))
            .map(|(i, _)| i as u64)
            .collect();
        let kept: Vec<u64> = reports.iter().map(|r| r.vessel_id).collect();
        assert_eq!(kept, expected);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn test_retain_keeps_boundary_points() {
        let center = GeoPoint::new(55.225, 14.245);
        let ts = NaiveDateTime::default();
        for (dlat, dlon) in [(0.3, 0.0), (-0.2, 0.41), (0.0, -0.7), (0.123, 0.456), (-0.45, -0.05)] {
            let report = PositionReport::new(1, ts, 55.225 + dlat, 14.245 + dlon, 5.0);
            let geofence = Geofence {
                center,
                radius_km: haversine_km(&center, &report.position()),
            };

            let mut reports = vec![report];
            retain_within_circle(&mut reports, &geofence);
            assert_eq!(reports.len(), 1, "boundary point ({}, {}) dropped", dlat, dlon);

            let mut reports = vec![report];
            let shrunk = Geofence {
                radius_km: geofence.radius_km - 1e-9,
                ..geofence
            };
            retain_within_circle(&mut reports, &shrunk);
            assert!(reports.is_empty());
        }
    }

    #[test]
    fn test_unit_vector_chord_is_monotonic() {
        let origin = to_unit_vector(55.0_f64.to_radians(), 14.0_f64.to_radians());
        let near = to_unit_vector(55.01_f64.to_radians(), 14.0_f64.to_radians());
        let far = to_unit_vector(55.1_f64.to_radians(), 14.2_f64.to_radians());
        let chord2 = |a: [f64; 3], b: [f64; 3]| {
            (0..3).map(|i| (a[i] - b[i]).powi(2)).sum::<f64>()
        };
        let norm: f64 = origin.iter().map(|c| c * c).sum();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(chord2(origin, near) < chord2(origin, far));
    }
}
