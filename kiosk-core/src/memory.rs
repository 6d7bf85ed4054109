use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;

/// One point-in-time memory reading.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySample {
    pub timestamp: DateTime<Utc>,
    pub percent: f64,
    pub used_mb: f64,
}

/// Seam for the periodic memory gate; tests substitute scripted readings.
pub trait MemoryMonitor: Send {
    fn sample(&mut self) -> MemorySample;
}

/// System-wide memory usage via sysinfo. The browser runs as a child
/// process, so system-wide pressure is what actually matters here.
pub struct SystemMemoryMonitor {
    system: System,
}

impl SystemMemoryMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self { system }
    }
}

impl Default for SystemMemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor for SystemMemoryMonitor {
    fn sample(&mut self) -> MemorySample {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };
        MemorySample {
            timestamp: Utc::now(),
            percent,
            used_mb: used as f64 / (1024.0 * 1024.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_reports_bounded_percentage() {
        let mut monitor = SystemMemoryMonitor::new();
        let sample = monitor.sample();
        assert!(sample.percent >= 0.0);
        assert!(sample.percent <= 100.0);
    }
}
