//! # Vessel Rendezvous
//!
//! Finds the closest approach between two distinct moving vessels in recorded
//! AIS position reports confined to a circular sea area.
//!
//! This library provides:
//! - Haversine geofencing and record cleaning for AIS CSV exports
//! - Sliding-window (or exact-timestamp) grouping of time-ordered reports
//! - Great-circle nearest-neighbor search per window using an R-tree
//! - A deterministic min-fold across windows and across file shards
//!
//! ## Features
//!
//! - **`parallel`** - Process shards on a rayon thread pool (default)
//! - **`cli`** - Build the `rendezvous` binary (default)
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use vessel_rendezvous::{analyze_reports, AnalysisConfig, PositionReport};
//!
//! let at = NaiveDate::from_ymd_opt(2024, 3, 1)
//!     .unwrap()
//!     .and_hms_opt(12, 0, 0)
//!     .unwrap();
//! let reports = vec![
//!     PositionReport::new(219_000_001, at, 55.2250, 14.2450, 5.0),
//!     PositionReport::new(219_000_002, at, 55.2251, 14.2451, 5.0),
//! ];
//!
//! let analysis = analyze_reports(reports, &AnalysisConfig::default());
//! assert!(analysis.closest.is_found());
//! println!("{:.1} m apart", analysis.closest.distance_km * 1000.0);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, RendezvousError, Result};

// Analysis configuration (geofence, windowing, workers)
pub mod config;
pub use config::{AnalysisConfig, Geofence, LongitudeBounds, NeighborPolicy, WindowPolicy};

// Geographic utilities (haversine, geofence, unit-sphere projection)
pub mod geo_utils;

// Record cleaning and shard loading
pub mod preprocess;
pub use preprocess::{clean_reports, load_shard, parse_timestamp, PreprocessStats, RawReport};

// Temporal windowing
pub mod window;
pub use window::{sort_by_timestamp, windows, Window, Windows};

// Great-circle nearest-neighbor search
pub mod neighbors;
pub use neighbors::closest_pair_in_window;

// Shard and global reduction
pub mod reduce;
pub use reduce::{
    analyze_reports, analyze_shard, discover_shards, find_rendezvous, find_rendezvous_in_dir,
    GlobalSummary, ShardAnalysis,
};

// Output for trajectory rendering
pub mod trajectory;
pub use trajectory::{half_width_minutes, trajectory_around, RendezvousReport, TrajectoryPair};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in degrees.
///
/// # Example
/// ```
/// use vessel_rendezvous::GeoPoint;
/// let bornholm = GeoPoint::new(55.225, 14.245);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that the point is a real position on the globe.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One cleaned AIS position report.
///
/// Only the fields the analysis needs are retained; everything else in the
/// source row is discarded during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionReport {
    /// MMSI of the reporting vessel
    pub vessel_id: u64,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in knots
    pub speed_over_ground: f64,
}

impl PositionReport {
    pub fn new(
        vessel_id: u64,
        timestamp: NaiveDateTime,
        latitude: f64,
        longitude: f64,
        speed_over_ground: f64,
    ) -> Self {
        Self {
            vessel_id,
            timestamp,
            latitude,
            longitude,
            speed_over_ground,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// The closest approach found so far between two distinct vessels.
///
/// `ClosestPair::none()` is the sentinel (infinite distance, zero ids) and the
/// identity of [`ClosestPair::combine`]. Values are never mutated; a better
/// candidate replaces the old one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClosestPair {
    pub vessel_id_1: u64,
    pub vessel_id_2: u64,
    /// Great-circle separation in kilometers
    pub distance_km: f64,
    /// Start of the window in which the pair was found
    pub timestamp: NaiveDateTime,
    pub coords_1: Option<GeoPoint>,
    pub coords_2: Option<GeoPoint>,
}

impl ClosestPair {
    /// The "no pair found" sentinel.
    pub fn none() -> Self {
        Self {
            vessel_id_1: 0,
            vessel_id_2: 0,
            distance_km: f64::INFINITY,
            timestamp: NaiveDateTime::default(),
            coords_1: None,
            coords_2: None,
        }
    }

    /// Build a candidate from two reports observed in the same window.
    pub fn between(
        first: &PositionReport,
        second: &PositionReport,
        distance_km: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            vessel_id_1: first.vessel_id,
            vessel_id_2: second.vessel_id,
            distance_km,
            timestamp,
            coords_1: Some(first.position()),
            coords_2: Some(second.position()),
        }
    }

    /// True unless this is the sentinel.
    pub fn is_found(&self) -> bool {
        self.distance_km.is_finite()
    }

    /// Keep the closer of two results. On an exact tie the left side wins, so
    /// folding an ordered sequence always keeps the first minimum seen.
    pub fn combine(self, other: Self) -> Self {
        if self.distance_km <= other.distance_km {
            self
        } else {
            other
        }
    }
}

impl Default for ClosestPair {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Tests
// ============================================================================
