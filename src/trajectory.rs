//! Rendezvous output for trajectory rendering.
//!
//! Map and chart rendering live outside this crate. What they need is the
//! winning pair plus the winning shard's cleaned reports, from which each
//! vessel's track around the event is sliced.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::error::{RendezvousError, Result};
use crate::{ClosestPair, PositionReport};

/// Default half-width of the slice around the event.
pub const DEFAULT_TRAJECTORY_MINUTES: i64 = 10;

/// Widest accepted half-width: one week.
pub const MAX_TRAJECTORY_MINUTES: i64 = 10_080;

/// Validate a half-width given in minutes.
pub fn half_width_minutes(minutes: i64) -> Result<TimeDelta> {
    if !(1..=MAX_TRAJECTORY_MINUTES).contains(&minutes) {
        return Err(RendezvousError::config(format!(
            "trajectory half-width must be 1..={} minutes, got {}",
            MAX_TRAJECTORY_MINUTES, minutes
        )));
    }
    Ok(TimeDelta::minutes(minutes))
}

/// `[at - half_width, at + half_width]`, saturating at the calendar limits.
fn time_span(at: NaiveDateTime, half_width: TimeDelta) -> (NaiveDateTime, NaiveDateTime) {
    let half_width = half_width.abs();
    (
        at.checked_sub_signed(half_width).unwrap_or(NaiveDateTime::MIN),
        at.checked_add_signed(half_width).unwrap_or(NaiveDateTime::MAX),
    )
}

/// The global closest pair and the shard it came from.
#[derive(Debug, Clone)]
pub struct RendezvousReport {
    pub closest: ClosestPair,
    pub shard_path: Option<PathBuf>,
    /// Cleaned reports of the winning shard, in timestamp order
    pub reports: Vec<PositionReport>,
}

/// Both vessels' tracks around the closest approach.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryPair {
    pub closest: ClosestPair,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub track_1: Vec<PositionReport>,
    pub track_2: Vec<PositionReport>,
}

impl RendezvousReport {
    /// Slice both vessels' reports within `half_width` of the event.
    pub fn trajectories(&self, half_width: TimeDelta) -> TrajectoryPair {
        let at = self.closest.timestamp;
        let (from, to) = time_span(at, half_width);
        TrajectoryPair {
            closest: self.closest,
            from,
            to,
            track_1: trajectory_around(&self.reports, self.closest.vessel_id_1, at, half_width),
            track_2: trajectory_around(&self.reports, self.closest.vessel_id_2, at, half_width),
        }
    }
}

impl TrajectoryPair {
    /// Write as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let output_err = |message: String| RendezvousError::Output {
            path: path.to_path_buf(),
            message,
        };
        let file = File::create(path).map_err(|e| output_err(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| output_err(e.to_string()))
    }
}

/// One vessel's reports in `[at - half_width, at + half_width]`, time ordered.
pub fn trajectory_around(
    reports: &[PositionReport],
    vessel_id: u64,
    at: NaiveDateTime,
    half_width: TimeDelta,
) -> Vec<PositionReport> {
    let (from, to) = time_span(at, half_width);
    let mut track: Vec<PositionReport> = reports
        .iter()
        .filter(|r| r.vessel_id == vessel_id && r.timestamp >= from && r.timestamp <= to)
        .copied()
        .collect();
    track.sort_by_key(|r| r.timestamp);
    track
}
