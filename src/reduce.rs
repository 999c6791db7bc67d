//! Shard and global reduction.
//!
//! Each shard (one CSV file) is loaded, cleaned, windowed and searched on its
//! own worker with no shared state. Shard results are folded into a single
//! [`GlobalSummary`] that keeps only the winning shard's reports in memory.
//!
//! Ordering: the fold is a min with left-preference on exact ties, and shard
//! paths are processed as an ordered sequence, so the result is the same for
//! any worker count. Ties go to the earliest shard in path order, then the
//! earliest window, then the earliest report within that window.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{RendezvousError, Result};
use crate::neighbors::closest_pair_in_window;
use crate::preprocess::{load_shard, PreprocessStats};
use crate::trajectory::RendezvousReport;
use crate::window::{sort_by_timestamp, windows};
use crate::{ClosestPair, PositionReport};

/// Everything one shard produced.
#[derive(Debug, Clone)]
pub struct ShardAnalysis {
    /// Shard file, if the reports came from one
    pub source: Option<PathBuf>,
    pub closest: ClosestPair,
    /// Cleaned reports in timestamp order
    pub reports: Vec<PositionReport>,
    pub stats: PreprocessStats,
    /// Windows with at least two reports
    pub windows_evaluated: usize,
}

impl ShardAnalysis {
    /// The shard's closest pair, or `EmptyShard` if it found none.
    pub fn rendezvous(&self) -> Result<ClosestPair> {
        if self.closest.is_found() {
            Ok(self.closest)
        } else {
            Err(RendezvousError::EmptyShard {
                path: self.source.clone().unwrap_or_default(),
            })
        }
    }
}

/// Run the windowed search over an already cleaned batch.
pub fn analyze_reports(mut reports: Vec<PositionReport>, config: &AnalysisConfig) -> ShardAnalysis {
    sort_by_timestamp(&mut reports);

    let mut windows_evaluated = 0;
    let closest = windows(&reports, config.window)
        .inspect(|_| windows_evaluated += 1)
        .map(|w| closest_pair_in_window(&w, config.neighbor_policy))
        .fold(ClosestPair::none(), ClosestPair::combine);

    ShardAnalysis {
        source: None,
        closest,
        stats: PreprocessStats {
            kept: reports.len(),
            rows_read: reports.len(),
            ..Default::default()
        },
        reports,
        windows_evaluated,
    }
}

/// Load, clean and search one shard file.
pub fn analyze_shard(path: &Path, config: &AnalysisConfig) -> Result<ShardAnalysis> {
    let start = Instant::now();
    let (reports, stats) = load_shard(path, config)?;

    let mut analysis = analyze_reports(reports, config);
    analysis.source = Some(path.to_path_buf());
    analysis.stats = stats;

    info!(
        "[Reducer] {}: {} of {} rows kept, {} windows, best {:.3} km in {}ms",
        path.display(),
        stats.kept,
        stats.rows_read,
        analysis.windows_evaluated,
        analysis.closest.distance_km,
        start.elapsed().as_millis()
    );
    debug!(
        "[Reducer] {}: dropped {} malformed, {} out of bounds, {} slow, {} outside geofence",
        path.display(),
        stats.malformed,
        stats.out_of_bounds,
        stats.too_slow,
        stats.outside_geofence
    );

    Ok(analysis)
}

/// List the `*.csv` shards in a directory, sorted by path, at most `limit`.
pub fn discover_shards(dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| RendezvousError::shard_io(dir, e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    Ok(paths)
}

/// Outcome of a run across all shards.
#[derive(Debug, Clone, Default)]
pub struct GlobalSummary {
    /// Winning shard, if any shard found a pair
    pub best: Option<ShardAnalysis>,
    pub shards_total: usize,
    /// Shards with no window holding two distinct vessels
    pub shards_empty: usize,
    pub failures: Vec<RendezvousError>,
    /// Row counts summed over every shard that could be read
    pub stats: PreprocessStats,
}

impl GlobalSummary {
    /// The overall closest pair, or the sentinel.
    pub fn closest(&self) -> ClosestPair {
        self.best
            .as_ref()
            .map(|b| b.closest)
            .unwrap_or_else(ClosestPair::none)
    }

    /// Hand the result to the trajectory consumer.
    ///
    /// Fails with `NoRendezvous` when every shard failed or was empty.
    pub fn rendezvous(self) -> Result<RendezvousReport> {
        match self.best {
            Some(best) if best.closest.is_found() => Ok(RendezvousReport {
                closest: best.closest,
                shard_path: best.source,
                reports: best.reports,
            }),
            _ => Err(RendezvousError::NoRendezvous {
                shards_total: self.shards_total,
                shards_failed: self.failures.len(),
            }),
        }
    }

    /// Fold one shard outcome into the summary.
    pub fn absorb(mut self, outcome: Result<ShardAnalysis>) -> Self {
        self.shards_total += 1;
        match outcome {
            Ok(analysis) => {
                self.stats.merge(&analysis.stats);
                match analysis.rendezvous() {
                    Ok(_) => self.best = pick_closer(self.best, Some(analysis)),
                    Err(e) => {
                        self.shards_empty += 1;
                        debug!("[Reducer] {}", e);
                    }
                }
            }
            Err(e) => {
                warn!("[Reducer] Skipping shard: {}", e);
                self.failures.push(e);
            }
        }
        self
    }

    /// Combine two summaries covering consecutive runs of shards.
    pub fn merge(mut self, right: Self) -> Self {
        self.best = pick_closer(self.best, right.best);
        self.shards_total += right.shards_total;
        self.shards_empty += right.shards_empty;
        self.failures.extend(right.failures);
        self.stats.merge(&right.stats);
        self
    }
}

/// Left wins ties, mirroring [`ClosestPair::combine`].
fn pick_closer(left: Option<ShardAnalysis>, right: Option<ShardAnalysis>) -> Option<ShardAnalysis> {
    match (left, right) {
        (Some(l), Some(r)) => {
            if r.closest.distance_km < l.closest.distance_km {
                Some(r)
            } else {
                Some(l)
            }
        }
        (l, r) => l.or(r),
    }
}

/// Search every shard and fold the results.
///
/// Shard failures are isolated: they are logged, listed in
/// [`GlobalSummary::failures`] and excluded from the minimum. Only an invalid
/// configuration fails the whole run.
pub fn find_rendezvous(paths: &[PathBuf], config: &AnalysisConfig) -> Result<GlobalSummary> {
    config.validate()?;
    let start = Instant::now();

    let summary = reduce_shards(paths, config)?;

    info!(
        "[Reducer] {} shards ({} failed, {} empty) reduced to {:.3} km in {}ms",
        summary.shards_total,
        summary.failures.len(),
        summary.shards_empty,
        summary.closest().distance_km,
        start.elapsed().as_millis()
    );
    Ok(summary)
}

/// Discover the shards in `dir` and search them.
pub fn find_rendezvous_in_dir(dir: &Path, config: &AnalysisConfig) -> Result<GlobalSummary> {
    config.validate()?;
    let paths = discover_shards(dir, config.num_files)?;
    info!("[Reducer] Found {} shards in {}", paths.len(), dir.display());
    find_rendezvous(&paths, config)
}

#[cfg(feature = "parallel")]
fn reduce_shards(paths: &[PathBuf], config: &AnalysisConfig) -> Result<GlobalSummary> {
    use rayon::prelude::*;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = config.max_workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder
        .build()
        .map_err(|e| RendezvousError::config(format!("cannot start worker pool: {}", e)))?;
    info!(
        "[Reducer] Processing {} shards on {} workers",
        paths.len(),
        pool.current_num_threads()
    );

    // Indexed fold/reduce keep shards in path order, so ties resolve the same way on any pool size
    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|path| analyze_shard(path, config))
            .fold(GlobalSummary::default, GlobalSummary::absorb)
            .reduce(GlobalSummary::default, GlobalSummary::merge)
    }))
}

#[cfg(not(feature = "parallel"))]
fn reduce_shards(paths: &[PathBuf], config: &AnalysisConfig) -> Result<GlobalSummary> {
    Ok(paths
        .iter()
        .map(|path| analyze_shard(path, config))
        .fold(GlobalSummary::default(), GlobalSummary::absorb))
}
