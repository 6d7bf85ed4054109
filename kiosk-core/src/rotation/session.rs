use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Mutable per-process rotation state, owned exclusively by the scheduling
/// task. Created at startup, optionally persisted into the final metrics
/// snapshot at exit.
#[derive(Debug)]
pub struct SessionState {
    /// Navigation attempts, retries included.
    pub total_visits: u64,
    pub successful_visits: u64,
    /// URLs evicted for the remainder of the current cycle. Cleared at every
    /// cycle boundary.
    pub failed_urls: Vec<String>,
    /// Successful browser restarts so far; never exceeds the restart budget.
    pub browser_restart_count: u32,
    pub last_memory_check: Instant,
    pub cycle_count: u64,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            total_visits: 0,
            successful_visits: 0,
            failed_urls: Vec::new(),
            browser_restart_count: 0,
            last_memory_check: Instant::now(),
            cycle_count: 0,
            started_at: Utc::now(),
        }
    }

    pub fn success_rate(&self) -> Option<f64> {
        if self.total_visits == 0 {
            None
        } else {
            Some(self.successful_visits as f64 / self.total_visits as f64)
        }
    }

    pub fn mark_failed(&mut self, url: &str) {
        if !self.failed_urls.iter().any(|failed| failed == url) {
            self.failed_urls.push(url.to_string());
        }
    }

    pub fn is_failed(&self, url: &str) -> bool {
        self.failed_urls.iter().any(|failed| failed == url)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_guards_division_by_zero() {
        let mut session = SessionState::new();
        assert_eq!(session.success_rate(), None);
        session.total_visits = 4;
        session.successful_visits = 1;
        assert_eq!(session.success_rate(), Some(0.25));
    }

    #[test]
    fn failed_urls_are_deduplicated() {
        let mut session = SessionState::new();
        session.mark_failed("https://a.example/");
        session.mark_failed("https://a.example/");
        session.mark_failed("https://b.example/");
        assert_eq!(session.failed_urls.len(), 2);
        assert!(session.is_failed("https://a.example/"));
        assert!(!session.is_failed("https://c.example/"));
    }
}
