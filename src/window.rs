//! Temporal windowing of time-ordered reports.
//!
//! Windows borrow contiguous slices of the sorted shard, so producing one
//! costs two binary searches and no allocation. Windows holding fewer than
//! two reports are never yielded, and long runs of them are jumped over in
//! one step, so a stray timestamp years away costs nothing.

use chrono::{NaiveDateTime, TimeDelta};
use log::debug;

use crate::config::WindowPolicy;
use crate::PositionReport;

/// A group of reports compared against each other.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// Window start (sliding) or the shared timestamp (exact grouping)
    pub start: NaiveDateTime,
    pub reports: &'a [PositionReport],
}

/// Sort reports by timestamp, keeping file order among equal timestamps.
pub fn sort_by_timestamp(reports: &mut [PositionReport]) {
    reports.sort_by_key(|r| r.timestamp);
}

/// Iterate the windows of a batch sorted by timestamp.
pub fn windows(sorted: &[PositionReport], policy: WindowPolicy) -> Windows<'_> {
    debug_assert!(sorted.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    match policy {
        WindowPolicy::Sliding {
            window_size_secs,
            step_size_secs,
        } => {
            let bounds = sorted.first().zip(sorted.last());
            Windows::Sliding {
                reports: sorted,
                current: bounds.map(|(first, _)| first.timestamp),
                end: bounds.map(|(_, last)| last.timestamp),
                size: TimeDelta::seconds(i64::from(window_size_secs)),
                // A zero step never advances; validation rejects it, this guards the loop
                step: TimeDelta::seconds(i64::from(step_size_secs.max(1))),
            }
        }
        WindowPolicy::ExactTimestamp => Windows::Exact {
            reports: sorted,
            pos: 0,
        },
    }
}

/// Number of steps until a window first reaches `target`.
///
/// `window_end` is the end of the window at `start` and lies before `target`.
fn steps_to_reach(window_end: NaiveDateTime, target: NaiveDateTime, step: TimeDelta) -> i64 {
    let gap_ms = target.signed_duration_since(window_end).num_milliseconds();
    let step_ms = step.num_milliseconds().max(1);
    (gap_ms.saturating_add(step_ms - 1) / step_ms).max(1)
}

/// Iterator over the windows of one shard.
#[derive(Debug, Clone)]
pub enum Windows<'a> {
    Sliding {
        reports: &'a [PositionReport],
        current: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        size: TimeDelta,
        step: TimeDelta,
    },
    Exact {
        reports: &'a [PositionReport],
        pos: usize,
    },
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Window<'a>> {
        match self {
            Windows::Sliding {
                reports,
                current,
                end,
                size,
                step,
            } => {
                let all: &'a [PositionReport] = *reports;
                loop {
                    let start = (*current)?;
                    if start > (*end)? {
                        return None;
                    }
                    *current = start.checked_add_signed(*step);

                    let window_end = start.checked_add_signed(*size).unwrap_or(NaiveDateTime::MAX);
                    let lo = all.partition_point(|r| r.timestamp < start);
                    let hi = all.partition_point(|r| r.timestamp <= window_end);
                    if hi - lo >= 2 {
                        return Some(Window {
                            start,
                            reports: &all[lo..hi],
                        });
                    }

                    // No later window can hold two reports until one reaches all[lo + 1]
                    let Some(next) = all.get(lo + 1) else {
                        *current = None;
                        return None;
                    };
                    let steps = steps_to_reach(window_end, next.timestamp, *step);
                    if steps > 1 {
                        debug!(
                            "[Windows] Skipping {} windows with fewer than two reports after {}",
                            steps - 1,
                            start
                        );
                    }
                    *current = TimeDelta::try_milliseconds(steps.saturating_mul(step.num_milliseconds()))
                        .and_then(|jump| start.checked_add_signed(jump));
                }
            }
            Windows::Exact { reports, pos } => {
                let all: &'a [PositionReport] = *reports;
                loop {
                    let rest = &all[*pos..];
                    let first = rest.first()?;
                    let len = rest.partition_point(|r| r.timestamp == first.timestamp);
                    *pos += len;
                    if len >= 2 {
                        return Some(Window {
                            start: first.timestamp,
                            reports: &rest[..len],
                        });
                    }
                }
            }
        }
    }
}
