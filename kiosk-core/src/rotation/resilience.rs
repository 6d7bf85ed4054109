use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::browser::{
    pick_user_agent, BrowserController, BrowserResult, LaunchSpec, PageInfo, ProxyRotator,
};
use crate::config::{NetworkSection, ResilienceSection};
use crate::memory::MemoryMonitor;
use crate::metrics::RotationMetrics;
use crate::telemetry::VisitTelemetry;

use super::outcome::VisitOutcome;
use super::probe::{ProbeVerdict, ReachabilityProbe};
use super::session::SessionState;

// Markers that flag a served error page. The final URL failing this check is
// a hard failure; the same markers in page content are advisory only.
const ERROR_INDICATORS: [&str; 5] = ["error", "not found", "404", "unavailable", "maintenance"];

/// Wraps every navigation attempt with health checks, validation, bounded
/// retries, and restart escalation. All per-URL failures are contained here
/// and surfaced to the scheduler as a `VisitOutcome`.
pub struct ResilienceManager {
    controller: Box<dyn BrowserController>,
    probe: Box<dyn ReachabilityProbe>,
    memory: Box<dyn MemoryMonitor>,
    proxies: ProxyRotator,
    user_agents: Vec<String>,
    settings: ResilienceSection,
    telemetry: Option<Arc<VisitTelemetry>>,
}

impl ResilienceManager {
    pub fn new(
        settings: ResilienceSection,
        network: &NetworkSection,
        controller: Box<dyn BrowserController>,
        probe: Box<dyn ReachabilityProbe>,
        memory: Box<dyn MemoryMonitor>,
        telemetry: Option<Arc<VisitTelemetry>>,
    ) -> Self {
        Self {
            controller,
            probe,
            memory,
            proxies: ProxyRotator::new(network.proxies.clone()),
            user_agents: network.user_agents.clone(),
            settings,
            telemetry,
        }
    }

    /// Initial browser start. Failure here is fatal for the process; no
    /// retry happens at this level.
    pub async fn start_browser(&mut self) -> BrowserResult<()> {
        let spec = self.launch_spec();
        self.controller.start(&spec).await
    }

    /// Best-effort teardown for shutdown paths.
    pub async fn stop_browser(&mut self) {
        if let Err(err) = self.controller.stop().await {
            warn!(error = %err, "error stopping browser");
        }
    }

    /// One guarded visit: an explicit bounded retry loop around the whole
    /// memory-check / validate / health-check / navigate / hold procedure.
    pub async fn guarded_visit(
        &mut self,
        url: &str,
        hold: Duration,
        session: &mut SessionState,
        metrics: &mut RotationMetrics,
    ) -> VisitOutcome {
        let mut retry_count = 0usize;
        loop {
            if retry_count >= self.settings.max_retries {
                error!(url, retries = retry_count, "max retries reached, skipping");
                let outcome = VisitOutcome::TimedOut(format!(
                    "{} attempts exhausted",
                    self.settings.max_retries
                ));
                // retry_count attempts were actually made at this point.
                self.record_failure(url, &outcome, retry_count, session);
                return outcome;
            }

            session.total_visits += 1;
            let attempt_started = Instant::now();

            // Periodic memory gate. The clock advances whether or not the
            // reading was high.
            let memory_period = Duration::from_secs(self.settings.memory_check_period_secs);
            if session.last_memory_check.elapsed() >= memory_period {
                let sample = self.memory.sample();
                debug!(
                    percent = sample.percent,
                    used_mb = sample.used_mb,
                    "memory check"
                );
                let over_budget = sample.percent > self.settings.max_memory_percent;
                metrics.record_memory(sample);
                session.last_memory_check = Instant::now();
                if over_budget {
                    warn!(url, "high memory usage detected, restarting browser");
                    if !self.restart_browser(session, metrics).await {
                        let outcome = VisitOutcome::BrowserCrashed(
                            "restart after memory pressure failed".to_string(),
                        );
                        self.record_failure(url, &outcome, retry_count + 1, session);
                        return outcome;
                    }
                }
            }

            // Lightweight reachability probe before involving the browser.
            // A failed probe is terminal for this call and consumes no retry.
            match self.probe.check(url).await {
                ProbeVerdict::Reachable => {}
                verdict => {
                    let reason = verdict.reason().unwrap_or("probe failed").to_string();
                    warn!(url, reason = %reason, "url validation failed");
                    let outcome = VisitOutcome::ValidationFailed(reason);
                    self.record_failure(url, &outcome, retry_count + 1, session);
                    return outcome;
                }
            }

            if !self.controller.is_healthy().await {
                warn!("browser not healthy, attempting restart");
                if !self.restart_browser(session, metrics).await {
                    let outcome = VisitOutcome::BrowserCrashed(
                        "browser unresponsive and restart failed".to_string(),
                    );
                    self.record_failure(url, &outcome, retry_count + 1, session);
                    return outcome;
                }
            }

            info!(url, "visiting");
            let page_timeout = Duration::from_secs(self.settings.page_load_timeout_secs);
            let page = match self.controller.navigate_new_tab(url, page_timeout).await {
                Ok(page) => page,
                Err(err) if err.is_timeout() => {
                    warn!(url, error = %err, "timeout loading page, retrying");
                    retry_count += 1;
                    continue;
                }
                Err(err) if err.is_crash() => {
                    error!(url, error = %err, "browser transport error");
                    if self.restart_browser(session, metrics).await {
                        retry_count += 1;
                        continue;
                    }
                    let outcome = VisitOutcome::BrowserCrashed(err.to_string());
                    self.record_failure(url, &outcome, retry_count + 1, session);
                    return outcome;
                }
                Err(err) => {
                    error!(url, error = %err, "error visiting url");
                    self.defensive_cleanup().await;
                    let outcome = VisitOutcome::UnknownError(err.to_string());
                    self.record_failure(url, &outcome, retry_count + 1, session);
                    return outcome;
                }
            };

            if let Some(outcome) = self.inspect_page(url, &page) {
                self.defensive_cleanup().await;
                self.record_failure(url, &outcome, retry_count + 1, session);
                return outcome;
            }

            info!(url, hold_secs = hold.as_secs_f64(), "staying on page");
            sleep(hold).await;

            if let Err(err) = self.controller.close_tab().await {
                error!(url, error = %err, "error closing tab after visit");
                self.defensive_cleanup().await;
                let outcome = VisitOutcome::UnknownError(err.to_string());
                self.record_failure(url, &outcome, retry_count + 1, session);
                return outcome;
            }

            let load_time = attempt_started.elapsed();
            session.successful_visits += 1;
            metrics.record_load_time(session.successful_visits, load_time);
            debug!(url, load_secs = load_time.as_secs_f64(), "visit completed");
            return VisitOutcome::Success { load_time };
        }
    }

    /// Post-load inspection. An error marker in the final URL means the
    /// navigation landed on an error page; markers in the content alone are
    /// logged and tolerated.
    fn inspect_page(&self, url: &str, page: &PageInfo) -> Option<VisitOutcome> {
        let final_url = page.final_url.to_lowercase();
        if ERROR_INDICATORS
            .iter()
            .any(|marker| final_url.contains(marker))
        {
            error!(url, final_url = %page.final_url, "page returned error status");
            return Some(VisitOutcome::UnknownError(format!(
                "final url indicates an error page: {}",
                page.final_url
            )));
        }

        let content = page.content.to_lowercase();
        if ERROR_INDICATORS
            .iter()
            .any(|marker| content.contains(marker))
        {
            warn!(url, "error indicators found in page content");
        }
        None
    }

    /// Bounded restart escalation. Refused outright once the budget is
    /// spent, without touching the controller.
    async fn restart_browser(
        &mut self,
        session: &mut SessionState,
        metrics: &mut RotationMetrics,
    ) -> bool {
        if session.browser_restart_count >= self.settings.max_browser_restarts {
            error!(
                max = self.settings.max_browser_restarts,
                "maximum browser restart attempts reached"
            );
            return false;
        }

        warn!(
            attempt = session.browser_restart_count + 1,
            max = self.settings.max_browser_restarts,
            "restarting browser"
        );
        if let Err(err) = self.controller.stop().await {
            warn!(error = %err, "error stopping browser before restart");
        }
        sleep(Duration::from_secs(self.settings.restart_settle_secs)).await;

        let spec = self.launch_spec();
        match self.controller.start(&spec).await {
            Ok(()) => {
                session.browser_restart_count += 1;
                metrics.record_restart();
                if let Some(telemetry) = &self.telemetry {
                    if let Err(err) =
                        telemetry.record_restart(spec.proxy.as_deref(), &spec.user_agent)
                    {
                        warn!(error = %err, "failed to record restart telemetry");
                    }
                }
                true
            }
            Err(err) => {
                error!(error = %err, "browser restart failed");
                false
            }
        }
    }

    /// Every (re)start advances the proxy rotation one position and draws a
    /// fresh random user agent.
    fn launch_spec(&mut self) -> LaunchSpec {
        let proxy = self.proxies.next();
        if let Some(proxy) = &proxy {
            info!(proxy = %proxy, "using proxy");
        }
        LaunchSpec {
            proxy,
            user_agent: pick_user_agent(&self.user_agents),
        }
    }

    /// Best-effort recovery after an unanticipated error mid-visit: close
    /// the offending tab and restore focus. Secondary errors are swallowed.
    async fn defensive_cleanup(&mut self) {
        if let Err(err) = self.controller.close_tab().await {
            debug!(error = %err, "cleanup after failed visit also failed");
        }
    }

    fn record_failure(
        &self,
        url: &str,
        outcome: &VisitOutcome,
        attempt: usize,
        session: &mut SessionState,
    ) {
        session.mark_failed(url);
        if let (Some(telemetry), Some(kind)) = (&self.telemetry, outcome.kind()) {
            if let Err(err) =
                telemetry.record_failure(url, kind, outcome.reason().unwrap_or_default(), attempt)
            {
                warn!(error = %err, "failed to record failure telemetry");
            }
        }
    }
}
