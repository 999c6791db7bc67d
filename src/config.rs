//! Configuration for the rendezvous search.
//!
//! Every tunable the analysis reads is passed explicitly through
//! [`AnalysisConfig`]; nothing is taken from ambient defaults at call time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RendezvousError, Result};
use crate::GeoPoint;

pub const DEFAULT_WINDOW_SIZE_SECS: u32 = 30;
pub const DEFAULT_STEP_SIZE_SECS: u32 = 5;

/// Circular region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geofence {
    pub center: GeoPoint,
    /// Radius in kilometers. The boundary is inclusive.
    pub radius_km: f64,
}

impl Default for Geofence {
    fn default() -> Self {
        Self {
            // Waters around Bornholm
            center: GeoPoint::new(55.225, 14.245),
            radius_km: 50.0,
        }
    }
}

/// How time-ordered reports are grouped into comparison windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Overlapping windows `[t, t + window_size]`, advanced by `step_size`
    /// from the earliest to the latest report.
    Sliding {
        window_size_secs: u32,
        step_size_secs: u32,
    },
    /// One window per distinct timestamp. Only simultaneous reports are
    /// compared.
    ExactTimestamp,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::Sliding {
            window_size_secs: DEFAULT_WINDOW_SIZE_SECS,
            step_size_secs: DEFAULT_STEP_SIZE_SECS,
        }
    }
}

/// Accepted longitude range for raw reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongitudeBounds {
    /// [-90, 90], matching the historical outputs of this analysis.
    #[default]
    Legacy,
    /// [-180, 180], the full geographic range.
    Full,
}

impl LongitudeBounds {
    pub fn limit(&self) -> f64 {
        match self {
            LongitudeBounds::Legacy => 90.0,
            LongitudeBounds::Full => 180.0,
        }
    }

    pub fn contains(&self, longitude: f64) -> bool {
        let limit = self.limit();
        longitude >= -limit && longitude <= limit
    }
}

/// Which neighbor of a point counts as its candidate partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborPolicy {
    /// Query the two nearest points (self plus one). If that neighbor is the
    /// same vessel the point yields no candidate.
    #[default]
    SecondNeighbor,
    /// Walk outwards until the first report from a different vessel.
    NearestOtherVessel,
}

/// Configuration for a full rendezvous run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub geofence: Geofence,
    pub window: WindowPolicy,
    /// Reports slower than this (knots) are dropped as anchored or drifting.
    /// Default: 1.0
    pub min_speed: f64,
    pub longitude_bounds: LongitudeBounds,
    pub neighbor_policy: NeighborPolicy,
    /// Worker threads for shard processing. None = all available cores.
    /// Every worker holds a whole shard in memory, so memory, not CPU, is
    /// the limit to watch when raising this.
    pub max_workers: Option<usize>,
    /// Process at most this many shards. None = all.
    pub num_files: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            geofence: Geofence::default(),
            window: WindowPolicy::default(),
            min_speed: 1.0,
            longitude_bounds: LongitudeBounds::default(),
            neighbor_policy: NeighborPolicy::default(),
            max_workers: None,
            num_files: None,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults. The result is validated before it is returned.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            RendezvousError::config(format!("cannot open {}: {}", path.display(), e))
        })?;
        let config: AnalysisConfig = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            RendezvousError::config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters the analysis cannot run with.
    pub fn validate(&self) -> Result<()> {
        let Geofence { center, radius_km } = self.geofence;
        if !center.is_valid() {
            return Err(RendezvousError::config(format!(
                "geofence center ({}, {}) is not a valid coordinate",
                center.latitude, center.longitude
            )));
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(RendezvousError::config(format!(
                "geofence radius must be a non-negative number of km, got {}",
                radius_km
            )));
        }

        if let WindowPolicy::Sliding {
            window_size_secs,
            step_size_secs,
        } = self.window
        {
            if window_size_secs == 0 {
                return Err(RendezvousError::config("window size must be at least 1 second"));
            }
            if step_size_secs == 0 {
                return Err(RendezvousError::config("step size must be at least 1 second"));
            }
        }

        if !self.min_speed.is_finite() || self.min_speed < 0.0 {
            return Err(RendezvousError::config(format!(
                "minimum speed must be a non-negative number, got {}",
                self.min_speed
            )));
        }
        if self.max_workers == Some(0) {
            return Err(RendezvousError::config("max_workers must be at least 1"));
        }
        if self.num_files == Some(0) {
            return Err(RendezvousError::config("num_files must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.geofence.center, GeoPoint::new(55.225, 14.245));
        assert_eq!(config.geofence.radius_km, 50.0);
        assert_eq!(
            config.window,
            WindowPolicy::Sliding {
                window_size_secs: 30,
                step_size_secs: 5
            }
        );
        assert_eq!(config.min_speed, 1.0);
        assert_eq!(config.longitude_bounds, LongitudeBounds::Legacy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(LongitudeBounds::Legacy.contains(90.0));
        assert!(!LongitudeBounds::Legacy.contains(120.0));
        assert!(LongitudeBounds::Full.contains(120.0));
        assert!(!LongitudeBounds::Full.contains(-180.5));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let cases = [
            AnalysisConfig {
                geofence: Geofence {
                    center: GeoPoint::new(95.0, 14.0),
                    radius_km: 50.0,
                },
                ..Default::default()
            },
            AnalysisConfig {
                geofence: Geofence {
                    radius_km: -1.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            AnalysisConfig {
                geofence: Geofence {
                    radius_km: f64::NAN,
                    ..Default::default()
                },
                ..Default::default()
            },
            AnalysisConfig {
                window: WindowPolicy::Sliding {
                    window_size_secs: 30,
                    step_size_secs: 0,
                },
                ..Default::default()
            },
            AnalysisConfig {
                window: WindowPolicy::Sliding {
                    window_size_secs: 0,
                    step_size_secs: 5,
                },
                ..Default::default()
            },
            AnalysisConfig {
                min_speed: -0.5,
                ..Default::default()
            },
            AnalysisConfig {
                max_workers: Some(0),
                ..Default::default()
            },
            AnalysisConfig {
                num_files: Some(0),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(RendezvousError::Config { .. })),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_exact_timestamp_needs_no_sizes() {
        let config = AnalysisConfig {
            window: WindowPolicy::ExactTimestamp,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"min_speed": 2.5, "window": {{"kind": "exact_timestamp"}}, "max_workers": 2}}"#
        )
        .unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.min_speed, 2.5);
        assert_eq!(config.window, WindowPolicy::ExactTimestamp);
        assert_eq!(config.max_workers, Some(2));
        assert_eq!(config.geofence, Geofence::default());
    }

    #[test]
    fn test_from_json_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"num_files": 0}}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(file.path()),
            Err(RendezvousError::Config { .. })
        ));

        let missing = Path::new("/nonexistent/rendezvous.json");
        assert!(matches!(
            AnalysisConfig::from_json_file(missing),
            Err(RendezvousError::Config { .. })
        ));
    }
}
