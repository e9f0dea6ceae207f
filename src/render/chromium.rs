//! Chromium rendering engine
//!
//! One browser process serves a whole run and each fetch gets its own tab.
//! The CDP handler stream must be polled for the browser to make progress,
//! so it runs in a background task until [`ChromiumRenderer::shutdown`].
//!
//! Navigation is bounded by `DOMContentLoaded`, not by the load event; the
//! load event is left to the settle step. The status code is taken from the
//! `Network.responseReceived` event of the main document.
//!
//! Load state waits poll the page every `POLL_INTERVAL` until the condition
//! holds or the deadline passes. A failed poll counts as "not yet".

use crate::config::BrowserConfig;
use crate::render::{
    parse_performance_timing, LoadState, NavigationTimings, PageHandle, RenderError, Renderer,
    StatusProbe,
};
use crate::state::RenderMode;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, FrameId};
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must stay unchanged to count as idle
const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);

const READY_STATE_SCRIPT: &str = "document.readyState === 'complete'";

const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";

const TIMING_SCRIPT: &str = "JSON.stringify(window.performance.timing)";

/// Rendering engine backed by a headless Chromium
pub struct ChromiumRenderer {
    /// `None` once the browser has been shut down
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    user_agent: &'static str,
    probe: StatusProbe,
}

impl ChromiumRenderer {
    /// Launches the browser
    ///
    /// # Arguments
    ///
    /// * `config` - Browser launch options
    /// * `mode` - Rendering profile; selects the user agent of every tab
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumRenderer)` - Browser running and its handler polled
    /// * `Err(RenderError::Launch)` - Chromium could not be started
    pub async fn launch(config: &BrowserConfig, mode: RenderMode) -> Result<Self, RenderError> {
        let mut builder = LaunchConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let launch_config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Launched Chromium (headless: {})", config.headless);

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            user_agent: mode.user_agent(),
            probe: StatusProbe::new(mode)?,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    type Page = ChromiumPage;

    async fn open_page(&self) -> Result<ChromiumPage, RenderError> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(RenderError::Closed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(format!("failed to open tab: {}", e)))?;

        // Wrap first so the tab is released even if the override fails
        let page = ChromiumPage::new(page);
        page.page()?
            .set_user_agent(SetUserAgentOverrideParams::new(self.user_agent))
            .await
            .map_err(|e| RenderError::Script(format!("failed to set user agent: {}", e)))?;

        // Document status codes are read from network events
        if let Err(e) = page.page()?.execute(EnableParams::default()).await {
            warn!("Failed to enable network events: {}", e);
        }

        Ok(page)
    }

    async fn request_status(&self, url: &str, timeout: Duration) -> Result<u16, RenderError> {
        self.probe.status(url, timeout).await
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        let browser = self.browser.write().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }

        // Only stop the handler once the browser is gone
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        info!("Chromium shut down");
        Ok(())
    }
}

/// A Chromium tab
///
/// Dropping a tab that was not closed schedules the close on the runtime.
pub struct ChromiumPage {
    page: Option<Page>,
}

impl ChromiumPage {
    fn new(page: Page) -> Self {
        Self { page: Some(page) }
    }

    fn page(&self) -> Result<&Page, RenderError> {
        self.page.as_ref().ok_or(RenderError::Closed)
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T, RenderError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| RenderError::Script(format!("unexpected script result: {}", e)))
    }

    /// Evaluates a script, giving up at `deadline`
    ///
    /// Returns `None` when the script failed or did not answer in time. A
    /// navigation in progress destroys the execution context, so failures
    /// here are expected and only logged.
    async fn poll<T: DeserializeOwned>(&self, script: &str, deadline: Instant) -> Option<T> {
        match tokio::time::timeout_at(deadline, self.evaluate(script)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                debug!("Poll failed, retrying: {}", e);
                None
            }
            Err(_) => None,
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), RenderError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll::<bool>(READY_STATE_SCRIPT, deadline).await == Some(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    what: LoadState::Load.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep_until((Instant::now() + POLL_INTERVAL).min(deadline)).await;
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), RenderError> {
        let deadline = Instant::now() + timeout;
        let mut last_count: Option<u64> = self.poll(RESOURCE_COUNT_SCRIPT, deadline).await;
        let mut quiet_since = Instant::now();

        loop {
            if last_count.is_some() && quiet_since.elapsed() >= NETWORK_QUIET_PERIOD {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    what: LoadState::NetworkIdle.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep_until((Instant::now() + POLL_INTERVAL).min(deadline)).await;

            let count = self.poll(RESOURCE_COUNT_SCRIPT, deadline).await;
            if count.is_none() || count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            }
        }
    }
}

/// Reads the status of the main document's response from the event stream
///
/// Redirect hops are not reported as `responseReceived`, so the first
/// document response for the frame is the final one.
async fn document_status<S>(responses: &mut S, main_frame: Option<&FrameId>) -> Option<u16>
where
    S: Stream<Item = Arc<EventResponseReceived>> + Unpin,
{
    while let Some(event) = responses.next().await {
        let same_frame = match (main_frame, event.frame_id.as_ref()) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        };
        if event.r#type == ResourceType::Document && same_frame {
            return u16::try_from(event.response.status).ok();
        }
    }
    None
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, RenderError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;
        let cdp_error = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        // Subscribe before navigating so no event is missed
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_error)?;
        let mut dom_ready = page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(cdp_error)?;
        let main_frame = page.mainframe().await.map_err(cdp_error)?;

        // `goto` only resolves on the load event, so DOMContentLoaded usually
        // wins; the navigation itself carries on in the browser either way
        let committed = tokio::time::timeout_at(deadline, async {
            tokio::select! {
                biased;
                result = page.goto(url) => result.map(|_| ()).map_err(cdp_error),
                _ = dom_ready.next() => Ok(()),
            }
        })
        .await;

        match committed {
            Err(_) => {
                return Err(RenderError::Timeout {
                    what: format!("navigation to {}", url),
                    after: timeout,
                })
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(())) => {}
        }

        let status = tokio::time::timeout_at(
            deadline,
            document_status(&mut responses, main_frame.as_ref()),
        )
        .await
        .unwrap_or(None);
        Ok(status)
    }

    async fn wait_for(&mut self, state: LoadState, timeout: Duration) -> Result<(), RenderError> {
        match state {
            LoadState::Load => self.wait_for_load(timeout).await,
            LoadState::NetworkIdle => self.wait_for_network_idle(timeout).await,
        }
    }

    async fn timings(&mut self) -> Result<NavigationTimings, RenderError> {
        let json: String = self.evaluate(TIMING_SCRIPT).await?;
        parse_performance_timing(&json)
            .map_err(|e| RenderError::Script(format!("unreadable performance timing: {}", e)))
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.page()?
            .content()
            .await
            .map_err(|e| RenderError::Script(e.to_string()))
    }

    async fn hrefs(&mut self, selector: &str) -> Result<Vec<String>, RenderError> {
        let selector = serde_json::to_string(selector)
            .map_err(|e| RenderError::Script(e.to_string()))?;
        let script = format!(
            "Array.from(document.querySelectorAll({})).map(e => e.href).filter(h => typeof h === 'string')",
            selector
        );
        self.evaluate(&script).await
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| RenderError::Script(format!("failed to close tab: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!("Failed to close abandoned tab: {}", e);
                    }
                });
            }
            Err(_) => warn!("Tab dropped outside a runtime; leaving it to the browser"),
        }
    }
}
