use std::time::Duration;

use async_trait::async_trait;

use super::error::BrowserResult;

/// Parameters for one browser process lifetime. A fresh spec is produced for
/// every (re)start: the proxy comes from the rotator's next position and the
/// user agent is drawn at random from the configured pool.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    pub proxy: Option<String>,
    pub user_agent: String,
}

/// What a navigation produced, as observed after the page settled.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub final_url: String,
    pub content: String,
}

/// The browser capability the rotation core depends on. The production
/// implementation drives Chromium over CDP; tests substitute scripted fakes.
///
/// All operations are serialized by the single scheduling task; a controller
/// never sees concurrent calls.
#[async_trait]
pub trait BrowserController: Send {
    /// Start a fresh browser process. Replaces any previous session.
    async fn start(&mut self, spec: &LaunchSpec) -> BrowserResult<()>;

    /// Open a new tab, load `url`, and report the settled page. The tab
    /// stays active until `close_tab`.
    async fn navigate_new_tab(&mut self, url: &str, timeout: Duration)
        -> BrowserResult<PageInfo>;

    /// Whether the browser process is still responsive.
    async fn is_healthy(&self) -> bool;

    /// Close the active tab and return focus to the original one.
    async fn close_tab(&mut self) -> BrowserResult<()>;

    /// Tear the browser process down.
    async fn stop(&mut self) -> BrowserResult<()>;
}
