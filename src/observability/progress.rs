// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Throttled progress emission.
//!
//! The engine reports progress through a write-only [`ProgressSink`];
//! the reporter in front of it enforces a minimum interval between
//! emissions and watches for stalls (many consecutive reports with no
//! percentage movement). Emission is synchronous and bounded — a slow
//! consumer drops lines rather than blocking a phase.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::observability::messages::store::ProgressStalled;
use crate::observability::messages::StructuredLog;

/// Minimum interval between emitted lines.
pub const THROTTLE_INTERVAL: Duration = Duration::from_millis(200);
/// Percentage movement below this counts as "no progress".
pub const MIN_PCT_DELTA: f64 = 0.05;
/// Consecutive no-progress emissions before a stall is flagged.
pub const STALL_THRESHOLD: u32 = 60;

/// Write-only destination for progress lines.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// CLI sink: structured progress lines on standard output.
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

/// Sink that drops everything; used where progress is irrelevant.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _line: &str) {}
}

struct ProgressState {
    last_emit: Option<Instant>,
    last_pct: Option<f64>,
    no_change_count: u32,
    stalled: bool,
}

pub struct ProgressReporter {
    sink: Box<dyn ProgressSink>,
    throttle: Duration,
    state: Mutex<ProgressState>,
}

impl ProgressReporter {
    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self::with_throttle(sink, THROTTLE_INTERVAL)
    }

    pub fn with_throttle(sink: impl ProgressSink + 'static, throttle: Duration) -> Self {
        ProgressReporter {
            sink: Box::new(sink),
            throttle,
            state: Mutex::new(ProgressState {
                last_emit: None,
                last_pct: None,
                no_change_count: 0,
                stalled: false,
            }),
        }
    }

    /// Report progress for a stage. Returns `true` when a line was
    /// actually emitted (not throttled away).
    #[allow(clippy::too_many_arguments)]
    pub fn emit(
        &self,
        stage: &str,
        substage: &str,
        processed: u64,
        total: u64,
        converges: Option<bool>,
        iterations: u64,
        db_operations: u64,
    ) -> bool {
        let pct = if total > 0 {
            ((processed as f64 / total as f64) * 100.0).min(100.0)
        } else {
            0.0
        };

        let mut state = self.state.lock().expect("progress lock poisoned");

        match state.last_pct {
            Some(last) if (pct - last).abs() < MIN_PCT_DELTA => {
                state.no_change_count += 1;
            }
            _ => {
                state.no_change_count = 0;
                state.last_pct = Some(pct);
            }
        }
        if state.no_change_count >= STALL_THRESHOLD && !state.stalled {
            state.stalled = true;
            ProgressStalled {
                stage,
                emissions: state.no_change_count,
            }
            .log();
        } else if state.no_change_count == 0 {
            state.stalled = false;
        }

        let now = Instant::now();
        let throttled = state
            .last_emit
            .map(|at| now.duration_since(at) < self.throttle)
            .unwrap_or(false);
        if throttled {
            return false;
        }
        state.last_emit = Some(now);
        drop(state);

        let converge_str = match converges {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        let mut line = format!(
            "[layout] {stage}>{substage} | {processed}/{total} ({pct:.1}%) | \
             conv:{converge_str} | it:{iterations} | db:{db_operations}"
        );
        if line.len() > 200 {
            line.truncate(197);
            line.push_str("...");
        }
        self.sink.emit(&line);
        true
    }

    /// Whether the last emissions were flagged as a stall.
    pub fn is_stalled(&self) -> bool {
        self.state.lock().expect("progress lock poisoned").stalled
    }

    /// Forget throttle and stall history, e.g. at a phase boundary.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        state.last_emit = None;
        state.last_pct = None;
        state.no_change_count = 0;
        state.stalled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct CollectingSink {
        lines: Arc<StdMutex<Vec<String>>>,
    }

    impl ProgressSink for CollectingSink {
        fn emit(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn line_format_carries_stage_counts_and_counters() {
        let sink = CollectingSink::default();
        let reporter = ProgressReporter::with_throttle(sink.clone(), Duration::ZERO);
        assert!(reporter.emit("toposort", "wave", 50, 200, Some(true), 3, 17));

        let lines = sink.lines.lock().unwrap();
        assert_eq!(
            lines[0],
            "[layout] toposort>wave | 50/200 (25.0%) | conv:yes | it:3 | db:17"
        );
    }

    #[test]
    fn zero_total_reports_zero_percent() {
        let sink = CollectingSink::default();
        let reporter = ProgressReporter::with_throttle(sink.clone(), Duration::ZERO);
        reporter.emit("init", "stats", 0, 0, None, 0, 0);
        let lines = sink.lines.lock().unwrap();
        assert!(lines[0].contains("0/0 (0.0%)"));
        assert!(lines[0].contains("conv:-"));
    }

    #[test]
    fn emissions_inside_the_throttle_window_are_dropped() {
        let sink = CollectingSink::default();
        let reporter = ProgressReporter::with_throttle(sink.clone(), Duration::from_secs(60));
        assert!(reporter.emit("fast", "grid", 1, 10, None, 0, 0));
        assert!(!reporter.emit("fast", "grid", 2, 10, None, 0, 0));
        assert!(!reporter.emit("fast", "grid", 3, 10, None, 0, 0));
        assert_eq!(sink.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn stall_is_flagged_after_repeated_no_progress() {
        let sink = CollectingSink::default();
        let reporter = ProgressReporter::with_throttle(sink, Duration::ZERO);
        reporter.emit("components", "place", 10, 100, None, 0, 0);
        for _ in 0..STALL_THRESHOLD {
            reporter.emit("components", "place", 10, 100, None, 0, 0);
        }
        assert!(reporter.is_stalled());

        // movement clears the stall
        reporter.emit("components", "place", 50, 100, None, 0, 0);
        assert!(!reporter.is_stalled());
    }

    #[test]
    fn overlong_lines_are_truncated() {
        let sink = CollectingSink::default();
        let reporter = ProgressReporter::with_throttle(sink.clone(), Duration::ZERO);
        let long_stage = "s".repeat(300);
        reporter.emit(&long_stage, "sub", 1, 2, None, 0, 0);
        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines[0].len(), 200);
        assert!(lines[0].ends_with("..."));
    }
}
