//! Record cleaning for one shard of AIS reports.
//!
//! Rows that cannot be parsed are dropped and counted; they never fail the
//! shard. Only an I/O failure on the shard itself does.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use log::debug;
use serde::Deserialize;

use crate::config::AnalysisConfig;
use crate::error::{RendezvousError, Result};
use crate::geo_utils::retain_within_circle;
use crate::PositionReport;

/// Timestamp layout used by the Danish Maritime Authority AIS exports.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// The columns of an AIS export row that the analysis reads.
/// Every other column is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReport {
    #[serde(rename = "# Timestamp", alias = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "MMSI")]
    pub mmsi: u64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "SOG")]
    pub sog: Option<f64>,
    /// Source line, filled in after deserialization
    #[serde(skip)]
    pub line: u64,
}

/// Row counts from cleaning one shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessStats {
    pub rows_read: usize,
    pub malformed: usize,
    pub out_of_bounds: usize,
    pub too_slow: usize,
    pub outside_geofence: usize,
    pub kept: usize,
}

impl PreprocessStats {
    /// Add the counts of another shard.
    pub fn merge(&mut self, other: &PreprocessStats) {
        self.rows_read += other.rows_read;
        self.malformed += other.malformed;
        self.out_of_bounds += other.out_of_bounds;
        self.too_slow += other.too_slow;
        self.outside_geofence += other.outside_geofence;
        self.kept += other.kept;
    }
}

/// Parse a `DD/MM/YYYY HH:MM:SS` timestamp.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|e| {
        RendezvousError::Parse {
            message: format!("bad timestamp '{}': {}", value, e),
        }
    })
}

/// Read every row of a CSV export.
///
/// Returns the parsed rows and the number of rows that could not be
/// deserialized. Only I/O errors and an unreadable header abort the read.
pub fn read_raw_reports<R: Read>(reader: R) -> std::result::Result<(Vec<RawReport>, usize), csv::Error> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut rows = Vec::new();
    let mut malformed = 0;
    let mut record = csv::StringRecord::new();

    loop {
        match rdr.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                match record.deserialize::<RawReport>(Some(&headers)) {
                    Ok(mut raw) => {
                        raw.line = line;
                        rows.push(raw);
                    }
                    Err(e) => {
                        malformed += 1;
                        debug!("[Preprocess] Dropping line {}: {}", line, e);
                    }
                }
            }
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                malformed += 1;
                debug!("[Preprocess] Dropping unreadable row: {}", e);
            }
        }
    }

    Ok((rows, malformed))
}

/// Clean a batch of raw rows.
///
/// Steps, in order:
/// 1. drop rows with latitude outside [-90, 90] or longitude outside the
///    configured bounds
/// 2. drop rows slower than `min_speed` (or with no speed at all)
/// 3. parse the timestamp, dropping rows where that fails
/// 4. drop rows outside the geofence
///
/// The output keeps the input order; callers sort before windowing.
pub fn clean_reports(raw: Vec<RawReport>, config: &AnalysisConfig) -> (Vec<PositionReport>, PreprocessStats) {
    let mut stats = PreprocessStats {
        rows_read: raw.len(),
        ..Default::default()
    };

    let mut reports = Vec::with_capacity(raw.len());
    for row in raw {
        // NaN fails both comparisons and is dropped here
        let lat_ok = row.latitude >= -90.0 && row.latitude <= 90.0;
        if !lat_ok || !config.longitude_bounds.contains(row.longitude) {
            stats.out_of_bounds += 1;
            continue;
        }

        let speed = match row.sog {
            Some(sog) if sog >= config.min_speed => sog,
            _ => {
                stats.too_slow += 1;
                continue;
            }
        };

        let timestamp = match parse_timestamp(&row.timestamp) {
            Ok(ts) => ts,
            Err(e) => {
                stats.malformed += 1;
                debug!("[Preprocess] Dropping line {}: {}", row.line, e);
                continue;
            }
        };

        reports.push(PositionReport::new(
            row.mmsi,
            timestamp,
            row.latitude,
            row.longitude,
            speed,
        ));
    }

    let before_geofence = reports.len();
    retain_within_circle(&mut reports, &config.geofence);
    stats.outside_geofence = before_geofence - reports.len();
    stats.kept = reports.len();

    (reports, stats)
}

/// Load and clean one shard file.
pub fn load_shard(path: &Path, config: &AnalysisConfig) -> Result<(Vec<PositionReport>, PreprocessStats)> {
    let file = File::open(path).map_err(|e| RendezvousError::shard_io(path, e))?;
    let (raw, malformed) =
        read_raw_reports(BufReader::new(file)).map_err(|e| RendezvousError::shard_io(path, e))?;

    let (reports, mut stats) = clean_reports(raw, config);
    stats.rows_read += malformed;
    stats.malformed += malformed;
    Ok((reports, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LongitudeBounds;
    use chrono::{NaiveDate, Timelike};

    const HEADER: &str = "# Timestamp,Type of mobile,MMSI,Latitude,Longitude,Navigational status,ROT,SOG,COG\n";

    fn raw(mmsi: u64, ts: &str, lat: f64, lon: f64, sog: Option<f64>) -> RawReport {
        RawReport {
            timestamp: ts.to_string(),
            mmsi,
            latitude: lat,
            longitude: lon,
            sog,
            line: 0,
        }
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("01/03/2024 12:34:56").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (12, 34, 56));

        // Day first, not month first
        let ts = parse_timestamp("13/01/2024 00:00:00").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_malformed() {
        for bad in ["2024-03-01 12:00:00", "01/13/2024 12:00:00", "", "01/03/2024"] {
            assert!(
                matches!(parse_timestamp(bad), Err(RendezvousError::Parse { .. })),
                "{} should fail",
                bad
            );
        }
    }

    #[test]
    fn test_read_raw_reports_ignores_extra_columns() {
        let csv = format!(
            "{}{}{}",
            HEADER,
            "01/03/2024 12:00:00,Class A,219000001,55.2250,14.2450,Under way,0.0,5.2,90.0\n",
            "01/03/2024 12:00:05,Class A,219000002,55.2251,14.2451,Under way,0.0,,90.0\n",
        );
        let (rows, malformed) = read_raw_reports(csv.as_bytes()).unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mmsi, 219000001);
        assert_eq!(rows[0].sog, Some(5.2));
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].sog, None);
    }

    #[test]
    fn test_read_raw_reports_plain_timestamp_header() {
        let csv = "Timestamp,MMSI,Latitude,Longitude,SOG\n01/03/2024 12:00:00,7,55.0,14.0,3.0\n";
        let (rows, malformed) = read_raw_reports(csv.as_bytes()).unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(rows[0].timestamp, "01/03/2024 12:00:00");
    }

    #[test]
    fn test_read_raw_reports_drops_malformed_rows() {
        let csv = format!(
            "{}{}{}{}",
            HEADER,
            "01/03/2024 12:00:00,Class A,219000001,55.2250,14.2450,Under way,0.0,5.2,90.0\n",
            "01/03/2024 12:00:00,Class A,not-a-number,55.2250,14.2450,Under way,0.0,5.2,90.0\n",
            "01/03/2024 12:00:00,Class A,219000003\n",
        );
        let (rows, malformed) = read_raw_reports(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(malformed, 2);
    }

    #[test]
    fn test_clean_reports_filters() {
        let config = AnalysisConfig::default();
        let rows = vec![
            raw(1, "01/03/2024 12:00:00", 55.225, 14.245, Some(5.0)),
            // too slow
            raw(2, "01/03/2024 12:00:00", 55.225, 14.245, Some(0.5)),
            // no speed
            raw(3, "01/03/2024 12:00:00", 55.225, 14.245, None),
            // latitude out of range
            raw(4, "01/03/2024 12:00:00", 91.0, 14.245, Some(5.0)),
            // longitude outside the legacy bound
            raw(5, "01/03/2024 12:00:00", 55.225, 120.0, Some(5.0)),
            // bad timestamp
            raw(6, "2024-03-01T12:00:00", 55.225, 14.245, Some(5.0)),
            // outside geofence
            raw(7, "01/03/2024 12:00:00", 57.0, 14.245, Some(5.0)),
            // exactly at the speed cutoff
            raw(8, "01/03/2024 12:00:00", 55.3, 14.3, Some(1.0)),
        ];

        let (reports, stats) = clean_reports(rows, &config);
        let ids: Vec<u64> = reports.iter().map(|r| r.vessel_id).collect();
        assert_eq!(ids, vec![1, 8]);
        assert_eq!(
            stats,
            PreprocessStats {
                rows_read: 8,
                malformed: 1,
                out_of_bounds: 2,
                too_slow: 2,
                outside_geofence: 1,
                kept: 2,
            }
        );
    }

    #[test]
    fn test_clean_reports_full_longitude_range() {
        let config = AnalysisConfig {
            longitude_bounds: LongitudeBounds::Full,
            geofence: crate::config::Geofence {
                center: crate::GeoPoint::new(0.0, 120.0),
                radius_km: 10.0,
            },
            ..Default::default()
        };
        let rows = vec![raw(5, "01/03/2024 12:00:00", 0.0, 120.0, Some(5.0))];
        let (reports, stats) = clean_reports(rows, &config);
        assert_eq!(reports.len(), 1);
        assert_eq!(stats.out_of_bounds, 0);
    }

    #[test]
    fn test_slow_reports_never_survive() {
        let config = AnalysisConfig::default();
        let rows: Vec<RawReport> = (0..20)
            .map(|i| raw(i, "01/03/2024 12:00:00", 55.225, 14.245, Some(i as f64 / 10.0)))
            .collect();
        let (reports, _) = clean_reports(rows, &config);
        assert!(reports.iter().all(|r| r.speed_over_ground >= config.min_speed));
        assert_eq!(reports.len(), 10);
    }

    #[test]
    fn test_load_shard_missing_file() {
        let result = load_shard(Path::new("/nonexistent/shard.csv"), &AnalysisConfig::default());
        assert!(matches!(result, Err(RendezvousError::ShardIo { .. })));
    }
}
