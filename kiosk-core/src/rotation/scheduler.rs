use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::BrowserError;
use crate::config::KioskConfig;
use crate::metrics::{MetricsReporter, RotationMetrics};

use super::pacer::AdaptivePacer;
use super::resilience::ResilienceManager;
use super::session::SessionState;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("browser failed to start: {0}")]
    Launch(#[from] BrowserError),
}

/// Why the rotation loop ended on its own. Cancellation never surfaces
/// here: the caller drops the running future and then invokes `shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// No working URLs remained at a cycle boundary.
    CatalogExhausted,
}

/// Drives the indefinite cycle-of-cycles loop over the catalog.
pub struct RotationScheduler {
    urls: Vec<String>,
    session: SessionState,
    pacer: AdaptivePacer,
    resilience: ResilienceManager,
    metrics: RotationMetrics,
    reporter: MetricsReporter,
    visit_delay_ms: [u64; 2],
    snapshot_every_cycles: u64,
}

impl RotationScheduler {
    pub fn new(config: &KioskConfig, urls: Vec<String>, resilience: ResilienceManager) -> Self {
        Self {
            urls,
            session: SessionState::new(),
            pacer: AdaptivePacer::new(&config.rotation),
            resilience,
            metrics: RotationMetrics::default(),
            reporter: MetricsReporter::new(config.observability.metrics_path.clone()),
            visit_delay_ms: config.rotation.visit_delay_ms,
            snapshot_every_cycles: config.rotation.snapshot_every_cycles,
        }
    }

    /// Runs until the working set empties. A browser that cannot start at
    /// all is the one fatal error; everything else is contained per URL.
    pub async fn run(&mut self) -> Result<ExitReason, RotationError> {
        info!(urls = self.urls.len(), "starting rotation");
        if let Err(err) = self.resilience.start_browser().await {
            error!(error = %err, "failed to start browser");
            return Err(RotationError::Launch(err));
        }

        loop {
            let mut working: Vec<String> = self
                .urls
                .iter()
                .filter(|url| !self.session.is_failed(url))
                .cloned()
                .collect();
            if working.is_empty() {
                error!("no working urls remaining");
                return Ok(ExitReason::CatalogExhausted);
            }

            let cycle = self.session.cycle_count + 1;
            info!(cycle, urls = working.len(), "starting cycle");
            working.shuffle(&mut rand::thread_rng());

            for url in &working {
                let hold = self.pacer.interval();
                let outcome = self
                    .resilience
                    .guarded_visit(url, hold, &mut self.session, &mut self.metrics)
                    .await;
                if !outcome.is_success() {
                    warn!(
                        url = %url,
                        reason = outcome.reason().unwrap_or("unknown"),
                        "failed to visit url"
                    );
                }

                self.visit_delay().await;
                self.pacer
                    .observe(self.session.total_visits, self.session.successful_visits);
            }

            info!(cycle, "completed cycle");
            if !self.session.failed_urls.is_empty() {
                warn!(failed = ?self.session.failed_urls, "failed urls in this cycle");
            }

            self.session.cycle_count = cycle;
            if self.snapshot_every_cycles > 0 && cycle % self.snapshot_every_cycles == 0 {
                self.reporter.persist(&self.metrics, &self.session);
            }
            // Evicted URLs become eligible again next cycle.
            self.session.failed_urls.clear();
        }
    }

    /// Graceful teardown: one final snapshot, then a best-effort browser
    /// stop. Safe to call after the run future was dropped mid-cycle.
    pub async fn shutdown(&mut self) {
        self.reporter.persist(&self.metrics, &self.session);
        self.resilience.stop_browser().await;
        info!("shutdown complete");
    }

    /// Short uniformly-random pause between URLs so the request pattern has
    /// no fixed period.
    async fn visit_delay(&self) {
        let [a, b] = self.visit_delay_ms;
        if a == 0 && b == 0 {
            return;
        }
        let (lower, upper) = (a.min(b), a.max(b));
        let delay = rand::thread_rng().gen_range(lower..=upper);
        sleep(Duration::from_millis(delay)).await;
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn metrics(&self) -> &RotationMetrics {
        &self.metrics
    }

    pub fn stay_interval_secs(&self) -> f64 {
        self.pacer.seconds()
    }
}
