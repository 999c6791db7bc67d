//! Find the two closest moving vessels in a sea area and export their tracks
//! around the moment of closest approach.
//!
//! Every worker loads a whole shard into memory, so with many large files
//! `--max-workers` is the knob that keeps memory in check.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::info;

use vessel_rendezvous::config::{DEFAULT_STEP_SIZE_SECS, DEFAULT_WINDOW_SIZE_SECS};
use vessel_rendezvous::trajectory::{half_width_minutes, DEFAULT_TRAJECTORY_MINUTES};
use vessel_rendezvous::{
    find_rendezvous_in_dir, AnalysisConfig, GeoPoint, LongitudeBounds, NeighborPolicy, OptionExt,
    RendezvousError, Result, WindowPolicy,
};

/// Closest approach between two moving vessels in recorded AIS data.
#[derive(Debug, Parser)]
#[command(name = "rendezvous", version)]
struct Cli {
    /// Directory holding one CSV export per shard.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// JSON configuration file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of parallel workers (default: all available).
    #[arg(short = 'w', long)]
    max_workers: Option<usize>,

    /// Number of files to process (default: all).
    #[arg(short = 'f', long)]
    num_files: Option<usize>,

    /// Sliding window length in seconds.
    #[arg(long)]
    window_size: Option<u32>,

    /// Sliding window step in seconds.
    #[arg(long)]
    step_size: Option<u32>,

    /// Compare only reports with identical timestamps instead of sliding windows.
    #[arg(long, conflicts_with_all = ["window_size", "step_size"])]
    exact_timestamps: bool,

    /// Geofence center latitude (requires --center-lon).
    #[arg(long, allow_hyphen_values = true)]
    center_lat: Option<f64>,

    /// Geofence center longitude (requires --center-lat).
    #[arg(long, allow_hyphen_values = true)]
    center_lon: Option<f64>,

    /// Geofence radius in kilometers.
    #[arg(long)]
    radius_km: Option<f64>,

    /// Minimum speed over ground in knots.
    #[arg(long)]
    min_speed: Option<f64>,

    /// Accept longitudes in [-180, 180] instead of the historical [-90, 90].
    #[arg(long)]
    full_longitude_range: bool,

    /// Pair each report with the nearest report of another vessel, not just its nearest neighbor.
    #[arg(long)]
    nearest_other_vessel: bool,

    /// Write both vessels' tracks around the rendezvous to this JSON file.
    #[arg(long)]
    trajectory_out: Option<PathBuf>,

    /// Half-width of the exported tracks in minutes (1 to 10080).
    #[arg(long, default_value_t = DEFAULT_TRAJECTORY_MINUTES)]
    trajectory_minutes: i64,
}

impl Cli {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };

        match (self.center_lat, self.center_lon) {
            (None, None) => {}
            (lat, lon) => {
                let latitude = lat.ok_or_config("--center-lon requires --center-lat")?;
                let longitude = lon.ok_or_config("--center-lat requires --center-lon")?;
                config.geofence.center = GeoPoint::new(latitude, longitude);
            }
        }
        if let Some(radius_km) = self.radius_km {
            config.geofence.radius_km = radius_km;
        }

        if self.exact_timestamps {
            config.window = WindowPolicy::ExactTimestamp;
        } else if self.window_size.is_some() || self.step_size.is_some() {
            let (size, step) = match config.window {
                WindowPolicy::Sliding {
                    window_size_secs,
                    step_size_secs,
                } => (window_size_secs, step_size_secs),
                WindowPolicy::ExactTimestamp => (DEFAULT_WINDOW_SIZE_SECS, DEFAULT_STEP_SIZE_SECS),
            };
            config.window = WindowPolicy::Sliding {
                window_size_secs: self.window_size.unwrap_or(size),
                step_size_secs: self.step_size.unwrap_or(step),
            };
        }

        if let Some(min_speed) = self.min_speed {
            config.min_speed = min_speed;
        }
        if self.full_longitude_range {
            config.longitude_bounds = LongitudeBounds::Full;
        }
        if self.nearest_other_vessel {
            config.neighbor_policy = NeighborPolicy::NearestOtherVessel;
        }
        if self.max_workers.is_some() {
            config.max_workers = self.max_workers;
        }
        if self.num_files.is_some() {
            config.num_files = self.num_files;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.analysis_config()?;
    let half_width = half_width_minutes(cli.trajectory_minutes)?;
    let start = Instant::now();

    let summary = find_rendezvous_in_dir(&cli.data_dir, &config)?;
    let report = summary.rendezvous()?;
    let closest = report.closest;

    let location = |coords: Option<GeoPoint>| {
        coords
            .map(|c| format!("({:.6}, {:.6})", c.latitude, c.longitude))
            .unwrap_or_else(|| "unknown".to_string())
    };
    println!("Rendezvous of the closest pair of vessels:");
    println!("MMSI 1: {} | Location {}", closest.vessel_id_1, location(closest.coords_1));
    println!("MMSI 2: {} | Location {}", closest.vessel_id_2, location(closest.coords_2));
    println!("Distance: {:.3} meters", closest.distance_km * 1000.0);
    println!("Timestamp: {}", closest.timestamp);
    if let Some(shard) = &report.shard_path {
        println!("Shard: {}", shard.display());
    }

    if let Some(path) = &cli.trajectory_out {
        let pair = report.trajectories(half_width);
        pair.write_json(path)?;
        info!(
            "Wrote {} + {} track points to {}",
            pair.track_1.len(),
            pair.track_2.len(),
            path.display()
        );
    }

    info!("Run took {:.4} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RendezvousError::NoRendezvous {
            shards_total,
            shards_failed,
        }) => {
            eprintln!(
                "No rendezvous found: none of the {} shards ({} unreadable) held two moving vessels in the same window.",
                shards_total, shards_failed
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
