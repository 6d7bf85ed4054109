use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kiosk_core::browser::{BrowserController, BrowserError, BrowserResult, LaunchSpec, PageInfo};
use kiosk_core::config::{NetworkSection, ResilienceSection};
use kiosk_core::memory::{MemoryMonitor, MemorySample};
use kiosk_core::metrics::RotationMetrics;
use kiosk_core::rotation::{
    ProbeVerdict, ReachabilityProbe, ResilienceManager, SessionState, VisitOutcome,
};

#[derive(Debug, Clone)]
enum NavStep {
    Loaded { final_url: &'static str, content: &'static str },
    Timeout,
    Crash,
    Fail,
}

#[derive(Default)]
struct CallLog {
    starts: Vec<LaunchSpec>,
    navigations: Vec<String>,
    stops: usize,
    closed_tabs: usize,
}

/// Browser controller driven by a fixed script of navigation outcomes.
#[derive(Clone)]
struct ScriptedController {
    script: Arc<Mutex<VecDeque<NavStep>>>,
    log: Arc<Mutex<CallLog>>,
    healthy: Arc<AtomicBool>,
    start_fails: Arc<AtomicBool>,
}

impl ScriptedController {
    fn new(steps: Vec<NavStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            log: Arc::new(Mutex::new(CallLog::default())),
            healthy: Arc::new(AtomicBool::new(true)),
            start_fails: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl BrowserController for ScriptedController {
    async fn start(&mut self, spec: &LaunchSpec) -> BrowserResult<()> {
        if self.start_fails.load(Ordering::SeqCst) {
            return Err(BrowserError::Launch("scripted launch failure".into()));
        }
        self.log.lock().unwrap().starts.push(spec.clone());
        self.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate_new_tab(
        &mut self,
        url: &str,
        _timeout: Duration,
    ) -> BrowserResult<PageInfo> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            None | Some(NavStep::Loaded { final_url: "", .. }) => Ok(PageInfo {
                final_url: url.to_string(),
                content: "<html><body>welcome</body></html>".to_string(),
            }),
            Some(NavStep::Loaded { final_url, content }) => Ok(PageInfo {
                final_url: final_url.to_string(),
                content: content.to_string(),
            }),
            Some(NavStep::Timeout) => Err(BrowserError::Timeout(format!("loading {url}"))),
            Some(NavStep::Crash) => {
                self.healthy.store(false, Ordering::SeqCst);
                Err(BrowserError::Transport("chrome not reachable".into()))
            }
            Some(NavStep::Fail) => Err(BrowserError::Unexpected("renderer exploded".into())),
        }
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn close_tab(&mut self) -> BrowserResult<()> {
        self.log.lock().unwrap().closed_tabs += 1;
        Ok(())
    }

    async fn stop(&mut self) -> BrowserResult<()> {
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }
}

struct AlwaysReachable;

#[async_trait]
impl ReachabilityProbe for AlwaysReachable {
    async fn check(&self, _url: &str) -> ProbeVerdict {
        ProbeVerdict::Reachable
    }
}

struct ScriptedProbe {
    verdicts: Mutex<VecDeque<ProbeVerdict>>,
    checks: Arc<Mutex<usize>>,
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn check(&self, _url: &str) -> ProbeVerdict {
        *self.checks.lock().unwrap() += 1;
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProbeVerdict::Reachable)
    }
}

struct FlatMemory {
    percent: f64,
}

impl MemoryMonitor for FlatMemory {
    fn sample(&mut self) -> MemorySample {
        MemorySample {
            timestamp: chrono::Utc::now(),
            percent: self.percent,
            used_mb: 512.0,
        }
    }
}

fn settings() -> ResilienceSection {
    ResilienceSection {
        max_retries: 3,
        max_browser_restarts: 5,
        memory_check_period_secs: 300,
        max_memory_percent: 80.0,
        restart_settle_secs: 0,
        page_load_timeout_secs: 30,
        probe_timeout_secs: 10,
        post_load_wait_secs: 0,
    }
}

fn manager(
    controller: ScriptedController,
    settings: ResilienceSection,
    network: NetworkSection,
) -> ResilienceManager {
    ResilienceManager::new(
        settings,
        &network,
        Box::new(controller),
        Box::new(AlwaysReachable),
        Box::new(FlatMemory { percent: 10.0 }),
        None,
    )
}

#[tokio::test]
async fn successful_visit_updates_counters() {
    let controller = ScriptedController::new(vec![]);
    let log = controller.log.clone();
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-a.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(session.total_visits, 1);
    assert_eq!(session.successful_visits, 1);
    assert!(session.failed_urls.is_empty());
    let log = log.lock().unwrap();
    assert_eq!(log.navigations, vec!["https://site-a.example/"]);
    assert_eq!(log.closed_tabs, 1);
}

#[tokio::test]
async fn url_that_always_times_out_is_attempted_exactly_three_times() {
    let controller =
        ScriptedController::new(vec![NavStep::Timeout, NavStep::Timeout, NavStep::Timeout]);
    let log = controller.log.clone();
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://slow.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(matches!(outcome, VisitOutcome::TimedOut(_)));
    assert_eq!(log.lock().unwrap().navigations.len(), 3);
    assert_eq!(session.total_visits, 3);
    assert_eq!(session.failed_urls, vec!["https://slow.example/"]);
}

#[tokio::test]
async fn validation_failure_is_terminal_and_never_reaches_the_browser() {
    let controller = ScriptedController::new(vec![]);
    let log = controller.log.clone();
    let checks = Arc::new(Mutex::new(0usize));
    let probe = ScriptedProbe {
        verdicts: Mutex::new(
            vec![ProbeVerdict::Unreachable("HTTP 503".into())]
                .into_iter()
                .collect(),
        ),
        checks: checks.clone(),
    };
    let mut manager = ResilienceManager::new(
        settings(),
        &NetworkSection::default(),
        Box::new(controller),
        Box::new(probe),
        Box::new(FlatMemory { percent: 10.0 }),
        None,
    );
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://flaky.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(matches!(outcome, VisitOutcome::ValidationFailed(_)));
    // Single probe, no navigation, no retry spent.
    assert_eq!(*checks.lock().unwrap(), 1);
    assert!(log.lock().unwrap().navigations.is_empty());
    assert_eq!(session.total_visits, 1);
    assert_eq!(session.failed_urls, vec!["https://flaky.example/"]);
}

#[tokio::test]
async fn crash_triggers_restart_and_the_retry_succeeds() {
    let controller = ScriptedController::new(vec![NavStep::Crash]);
    let log = controller.log.clone();
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-b.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(session.browser_restart_count, 1);
    assert_eq!(metrics.browser_restarts, 1);
    let log = log.lock().unwrap();
    // One stop/start pair for the restart, two navigation attempts.
    assert_eq!(log.stops, 1);
    assert_eq!(log.starts.len(), 1);
    assert_eq!(log.navigations.len(), 2);
}

#[tokio::test]
async fn sixth_restart_request_is_refused_without_teardown() {
    let controller = ScriptedController::new(vec![]);
    let log = controller.log.clone();
    let health = controller.healthy.clone();
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    session.browser_restart_count = 5;
    let mut metrics = RotationMetrics::default();

    // An unhealthy browser forces a restart request on the next visit.
    health.store(false, Ordering::SeqCst);

    let outcome = manager
        .guarded_visit(
            "https://site-c.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(matches!(outcome, VisitOutcome::BrowserCrashed(_)));
    let log = log.lock().unwrap();
    assert_eq!(log.stops, 0, "refused restart must not stop the browser");
    assert_eq!(log.starts.len(), 0, "refused restart must not start one");
    assert_eq!(session.browser_restart_count, 5);
}

#[tokio::test]
async fn unknown_navigation_error_fails_without_retry_and_cleans_up() {
    let controller = ScriptedController::new(vec![NavStep::Fail]);
    let log = controller.log.clone();
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-d.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(matches!(outcome, VisitOutcome::UnknownError(_)));
    let log = log.lock().unwrap();
    assert_eq!(log.navigations.len(), 1);
    assert_eq!(log.closed_tabs, 1, "defensive cleanup closes the tab");
    assert_eq!(session.total_visits, 1);
}

#[tokio::test]
async fn error_page_final_url_fails_the_visit() {
    let controller = ScriptedController::new(vec![NavStep::Loaded {
        final_url: "https://site-e.example/404",
        content: "<html>gone</html>",
    }]);
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-e.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(matches!(outcome, VisitOutcome::UnknownError(_)));
    assert_eq!(session.successful_visits, 0);
}

#[tokio::test]
async fn error_markers_in_content_alone_are_advisory() {
    let controller = ScriptedController::new(vec![NavStep::Loaded {
        final_url: "https://site-f.example/home",
        content: "<html><body>an error occurred loading one widget</body></html>",
    }]);
    let mut manager = manager(controller, settings(), NetworkSection::default());
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-f.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(session.successful_visits, 1);
}

#[tokio::test]
async fn restarts_walk_the_proxy_list_in_order() {
    let network = NetworkSection {
        proxies: vec![
            "http://proxy-a:3128".to_string(),
            "http://proxy-b:3128".to_string(),
            "http://proxy-c:3128".to_string(),
        ],
        ..NetworkSection::default()
    };
    // Three consecutive crashes, each followed by a successful restart and
    // eventually a successful load.
    let controller =
        ScriptedController::new(vec![NavStep::Crash, NavStep::Crash]);
    let log = controller.log.clone();
    let mut manager = manager(controller, settings(), network);
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    manager.start_browser().await.unwrap();
    let outcome = manager
        .guarded_visit(
            "https://site-g.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(outcome.is_success());
    let log = log.lock().unwrap();
    let proxies: Vec<_> = log
        .starts
        .iter()
        .map(|spec| spec.proxy.clone().unwrap())
        .collect();
    assert_eq!(
        proxies,
        vec![
            "http://proxy-a:3128",
            "http://proxy-b:3128",
            "http://proxy-c:3128"
        ]
    );
}

#[tokio::test]
async fn memory_pressure_forces_a_restart_before_the_visit() {
    let controller = ScriptedController::new(vec![]);
    let log = controller.log.clone();
    let mut manager = ResilienceManager::new(
        ResilienceSection {
            memory_check_period_secs: 0,
            ..settings()
        },
        &NetworkSection::default(),
        Box::new(controller),
        Box::new(AlwaysReachable),
        Box::new(FlatMemory { percent: 95.0 }),
        None,
    );
    let mut session = SessionState::new();
    let mut metrics = RotationMetrics::default();

    let outcome = manager
        .guarded_visit(
            "https://site-h.example/",
            Duration::ZERO,
            &mut session,
            &mut metrics,
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(session.browser_restart_count, 1);
    let log = log.lock().unwrap();
    assert_eq!(log.stops, 1);
    assert_eq!(log.starts.len(), 1);
    assert_eq!(metrics.memory_samples().count(), 1);
}
