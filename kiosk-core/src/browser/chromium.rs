use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::ChromiumSection;

use super::controller::{BrowserController, LaunchSpec, PageInfo};
use super::error::{BrowserError, BrowserResult};

/// Production `BrowserController` driving a Chromium instance over CDP.
pub struct ChromiumController {
    settings: ChromiumSection,
    post_load_wait: Duration,
    session: Option<Session>,
}

struct Session {
    browser: Browser,
    handler_task: JoinHandle<()>,
    tab: Option<Page>,
}

impl ChromiumController {
    pub fn new(settings: ChromiumSection, post_load_wait: Duration) -> Self {
        Self {
            settings,
            post_load_wait,
            session: None,
        }
    }

    fn build_config(&self, spec: &LaunchSpec) -> BrowserResult<ChromiumConfig> {
        let width = self.settings.window_width;
        let height = self.settings.window_height;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width,
            height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: width >= height,
            has_touch: false,
        });

        if let Some(executable) = &self.settings.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if !self.settings.sandbox {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            format!("--user-agent={}", spec.user_agent),
            format!("--window-size={width},{height}"),
            "--no-first-run".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-features=AutomationControlled".to_string(),
            "--mute-audio".to_string(),
        ];
        if self.settings.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if let Some(proxy) = &spec.proxy {
            args.push(format!("--proxy-server={proxy}"));
        }
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserController for ChromiumController {
    async fn start(&mut self, spec: &LaunchSpec) -> BrowserResult<()> {
        if self.session.is_some() {
            self.stop().await?;
        }
        let config = self.build_config(spec)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        info!(
            ua = %spec.user_agent,
            proxy = spec.proxy.as_deref().unwrap_or("none"),
            headless = self.settings.headless,
            "chromium instance started"
        );
        self.session = Some(Session {
            browser,
            handler_task,
            tab: None,
        });
        Ok(())
    }

    async fn navigate_new_tab(
        &mut self,
        url: &str,
        load_timeout: Duration,
    ) -> BrowserResult<PageInfo> {
        let session = self.session.as_mut().ok_or(BrowserError::NotStarted)?;

        // A tab left over from an aborted visit would otherwise accumulate.
        if let Some(stale) = session.tab.take() {
            if let Err(err) = stale.close().await {
                debug!(error = %err, "failed to close stale tab");
            }
        }

        let params = CreateTargetParams::new("about:blank");
        let page = timeout(load_timeout, session.browser.new_page(params))
            .await
            .map_err(|_| BrowserError::Timeout(format!("opening tab for {url}")))??;

        let navigate = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Unexpected)?;
        let loaded = timeout(load_timeout, async {
            page.goto(navigate).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        })
        .await;

        match loaded {
            Err(_) => {
                // The half-loaded tab would otherwise leak into the session.
                if let Err(err) = page.close().await {
                    debug!(error = %err, "failed to close timed-out tab");
                }
                return Err(BrowserError::Timeout(format!("loading {url}")));
            }
            Ok(Err(err)) => {
                if let Err(close_err) = page.close().await {
                    debug!(error = %close_err, "failed to close failed tab");
                }
                return Err(err);
            }
            Ok(Ok(())) => {}
        }

        // Let late redirects and client-side error pages settle before the
        // page is inspected.
        sleep(self.post_load_wait).await;

        let final_url = page
            .url()
            .await?
            .unwrap_or_else(|| url.to_string());
        let content = page.content().await.unwrap_or_default();
        session.tab = Some(page);
        Ok(PageInfo { final_url, content })
    }

    async fn is_healthy(&self) -> bool {
        match &self.session {
            None => false,
            Some(session) => session.browser.pages().await.is_ok(),
        }
    }

    async fn close_tab(&mut self) -> BrowserResult<()> {
        let session = self.session.as_mut().ok_or(BrowserError::NotStarted)?;
        if let Some(page) = session.tab.take() {
            page.close().await?;
        }
        Ok(())
    }

    async fn stop(&mut self) -> BrowserResult<()> {
        if let Some(mut session) = self.session.take() {
            if let Some(page) = session.tab.take() {
                if let Err(err) = page.close().await {
                    debug!(error = %err, "failed to close tab during shutdown");
                }
            }
            if let Err(err) = session.browser.close().await {
                warn!(error = %err, "failed to close browser gracefully");
            }
            if let Err(err) = session.handler_task.await {
                warn!(error = %err, "browser handler join error");
            }
            info!("chromium instance stopped");
        }
        Ok(())
    }
}
