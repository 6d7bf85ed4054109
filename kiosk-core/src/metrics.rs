use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::memory::MemorySample;
use crate::rotation::SessionState;

const MEMORY_RING_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Running counters accumulated across the whole process lifetime.
#[derive(Debug, Clone, Default)]
pub struct RotationMetrics {
    pub browser_restarts: u64,
    pub avg_load_time_secs: f64,
    memory_samples: VecDeque<MemorySample>,
}

impl RotationMetrics {
    pub fn record_restart(&mut self) {
        self.browser_restarts = self.browser_restarts.saturating_add(1);
    }

    /// Incremental running average over successful visits. `count` is the
    /// success counter after its increment for this visit.
    pub fn record_load_time(&mut self, count: u64, load_time: Duration) {
        if count == 0 {
            return;
        }
        let n = count as f64;
        self.avg_load_time_secs =
            (self.avg_load_time_secs * (n - 1.0) + load_time.as_secs_f64()) / n;
    }

    pub fn record_memory(&mut self, sample: MemorySample) {
        if self.memory_samples.len() >= MEMORY_RING_CAPACITY {
            self.memory_samples.pop_front();
        }
        self.memory_samples.push_back(sample);
    }

    pub fn memory_samples(&self) -> impl Iterator<Item = &MemorySample> {
        self.memory_samples.iter()
    }

    pub fn avg_memory_percent(&self) -> f64 {
        if self.memory_samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.memory_samples.iter().map(|sample| sample.percent).sum();
        sum / self.memory_samples.len() as f64
    }
}

/// Derived summary written to disk. Overwritten on every persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub session_duration_secs: i64,
    pub total_visits: u64,
    pub successful_visits: u64,
    pub success_rate: f64,
    pub browser_restarts: u64,
    pub avg_load_time_secs: f64,
    pub avg_memory_percent: f64,
    pub failed_urls: Vec<String>,
}

impl MetricsSnapshot {
    pub fn build(metrics: &RotationMetrics, session: &SessionState) -> Self {
        let now = Utc::now();
        Self {
            generated_at: now,
            session_duration_secs: (now - session.started_at).num_seconds(),
            total_visits: session.total_visits,
            successful_visits: session.successful_visits,
            success_rate: session.successful_visits as f64 / session.total_visits.max(1) as f64,
            browser_restarts: metrics.browser_restarts,
            avg_load_time_secs: metrics.avg_load_time_secs,
            avg_memory_percent: metrics.avg_memory_percent(),
            failed_urls: session.failed_urls.clone(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, MetricsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Persists snapshots to a well-known path. Failures are logged and
/// swallowed: reporting must never take the rotation loop down.
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    path: PathBuf,
}

impl MetricsReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(&self, metrics: &RotationMetrics, session: &SessionState) {
        match self.try_persist(metrics, session) {
            Ok(()) => info!(path = %self.path.display(), "metrics snapshot persisted"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to persist metrics snapshot"
            ),
        }
    }

    fn try_persist(
        &self,
        metrics: &RotationMetrics,
        session: &SessionState,
    ) -> Result<(), MetricsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = MetricsSnapshot::build(metrics, session);
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
