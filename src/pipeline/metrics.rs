//! Run metrics: stage launches, failures, and time spent in native stages.

use crate::error::Step;
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for one pipeline run.
#[derive(Debug)]
pub struct Metrics {
    /// Number of native stage processes launched
    pub stages_launched: AtomicU64,

    /// Number of launches that returned a non-zero status
    pub stages_failed: AtomicU64,

    /// Number of launches that could not be started
    pub launch_errors: AtomicU64,

    /// Number of steps that completed successfully
    pub steps_completed: AtomicU64,

    /// Number of steps skipped because there was nothing to process
    pub steps_skipped: AtomicU64,

    /// Time spent waiting on native stages (microseconds)
    pub stage_time_us: AtomicU64,

    /// Per-step wall time, in completion order
    step_times: Mutex<Vec<(Step, Duration)>>,

    /// Start time
    start_time: Instant,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stages_launched: AtomicU64::new(0),
            stages_failed: AtomicU64::new(0),
            launch_errors: AtomicU64::new(0),
            steps_completed: AtomicU64::new(0),
            steps_skipped: AtomicU64::new(0),
            stage_time_us: AtomicU64::new(0),
            step_times: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        })
    }

    /// Record a finished stage process and the time it ran.
    pub fn add_stage_run(&self, duration: Duration, success: bool) {
        self.stages_launched.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.stages_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.stage_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a stage that could not be started.
    pub fn add_launch_error(&self) {
        self.launch_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed step.
    pub fn add_step_completed(&self, step: Step, duration: Duration) {
        self.steps_completed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut times) = self.step_times.lock() {
            times.push((step, duration));
        }
    }

    /// Record a step that had no work.
    pub fn add_step_skipped(&self) {
        self.steps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let stage_time_us = self.stage_time_us.load(Ordering::Relaxed);
        let step_times = self
            .step_times
            .lock()
            .map(|times| {
                times
                    .iter()
                    .map(|(step, d)| StepTime {
                        step: *step,
                        secs: d.as_secs_f64(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            stages_launched: self.stages_launched.load(Ordering::Relaxed),
            stages_failed: self.stages_failed.load(Ordering::Relaxed),
            launch_errors: self.launch_errors.load(Ordering::Relaxed),
            steps_completed: self.steps_completed.load(Ordering::Relaxed),
            steps_skipped: self.steps_skipped.load(Ordering::Relaxed),
            stage_secs: stage_time_us as f64 / 1_000_000.0,
            elapsed: self.elapsed(),
            step_times,
        }
    }
}

/// Wall time of one completed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTime {
    pub step: Step,
    pub secs: f64,
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub stages_launched: u64,
    pub stages_failed: u64,
    pub launch_errors: u64,
    pub steps_completed: u64,
    pub steps_skipped: u64,
    /// Total time spent inside native stages (seconds)
    pub stage_secs: f64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub step_times: Vec<StepTime>,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path.display());
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let elapsed = self.elapsed.as_secs_f64();
        let stage_pct = if elapsed > 0.0 {
            (self.stage_secs / elapsed * 100.0).min(100.0)
        } else {
            0.0
        };

        write!(
            f,
            "Steps: {} completed, {} skipped | Stages: {} launched, {} failed, {} launch errors | \
             Elapsed: {:.1}s ({:.0}% in native stages)",
            self.steps_completed,
            self.steps_skipped,
            self.stages_launched,
            self.stages_failed,
            self.launch_errors,
            elapsed,
            stage_pct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counts() {
        let metrics = Metrics::new();
        metrics.add_stage_run(Duration::from_millis(5), true);
        metrics.add_stage_run(Duration::from_millis(5), false);
        metrics.add_launch_error();
        metrics.add_step_completed(Step::ScanFiltering, Duration::from_millis(10));
        metrics.add_step_skipped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stages_launched, 2);
        assert_eq!(snapshot.stages_failed, 1);
        assert_eq!(snapshot.launch_errors, 1);
        assert_eq!(snapshot.steps_completed, 1);
        assert_eq!(snapshot.steps_skipped, 1);
        assert_eq!(snapshot.step_times.len(), 1);
        assert!((snapshot.stage_secs - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_json() {
        let metrics = Metrics::new();
        metrics.add_step_completed(Step::DepthMaps, Duration::from_secs(2));
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["steps_completed"], 1);
        assert_eq!(json["step_times"][0]["step"], "depth_maps");
        assert_eq!(json["step_times"][0]["secs"], 2.0);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        Metrics::new().snapshot().save_to_file(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("stages_launched"));
    }
}
