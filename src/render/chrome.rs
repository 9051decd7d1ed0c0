//! Headless Chrome over the DevTools protocol
//!
//! One browser process per session with a single page. The CDP event
//! handler runs on its own task for as long as the session is open.

use super::{Locator, RenderBackend, RenderError, RenderLauncher};
use crate::config::{NetworkConfig, RendererConfig};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Interval between element lookups while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for a single CDP request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Upper bound for a page load
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Launches Chrome with the crawler's network identity
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    executable: Option<String>,
    headless: bool,
    window: Option<(u32, u32)>,
    args: Vec<String>,
}

impl ChromeLauncher {
    pub fn new(renderer: &RendererConfig, network: &NetworkConfig) -> Self {
        Self {
            executable: renderer.chrome_executable.clone(),
            headless: renderer.headless,
            window: renderer.window_dimensions(),
            args: browser_args(network),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(REQUEST_TIMEOUT)
            .args(self.args.iter().map(String::as_str));
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some((width, height)) = self.window {
            builder = builder.window_size(width, height);
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::Launch)
    }
}

/// Extra command-line switches: user agent and proxy
fn browser_args(network: &NetworkConfig) -> Vec<String> {
    let mut args = vec![
        "--disable-dev-shm-usage".to_string(),
        format!("--user-agent={}", network.user_agent),
    ];
    if let Some(proxy) = network.proxy_url() {
        args.push(format!("--proxy-server={}", proxy));
    }
    args
}

#[async_trait]
impl RenderLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderBackend>, RenderError> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                events.abort();
                return Err(RenderError::Launch(e.to_string()));
            }
        };

        tracing::info!(headless = self.headless, "Browser session started");
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            page: Some(page),
            events,
        }))
    }
}

/// A running Chrome process and its page
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    events: JoinHandle<()>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page.as_ref().ok_or(RenderError::Closed)
    }

    /// Looks the element up once; `None` when it is not in the DOM
    async fn find(&self, locator: &Locator) -> Result<Option<Element>, RenderError> {
        let page = self.page()?;
        let found = match locator {
            Locator::Css(selector) => page.find_element(selector.as_str()).await,
            Locator::Xpath(xpath) => page.find_xpath(xpath.as_str()).await,
        };
        match found {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                tracing::trace!(%locator, error = %e, "Element not found yet");
                Ok(None)
            }
        }
    }

    async fn poll_element(&self, locator: &Locator, timeout: Duration) -> Result<Option<Element>, RenderError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(locator).await? {
                return Ok(Some(element));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl RenderBackend for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let page = self.page()?;
        let navigation = tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url)).await;
        match navigation {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(RenderError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {}s", NAVIGATION_TIMEOUT.as_secs()),
            }),
        }
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, RenderError> {
        Ok(self.poll_element(locator, timeout).await?.is_some())
    }

    async fn dismiss(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, RenderError> {
        let Some(element) = self.poll_element(locator, timeout).await? else {
            return Ok(false);
        };
        element.click().await?;
        tracing::debug!(%locator, "Interstitial dismissed");
        Ok(true)
    }

    async fn current_document(&mut self) -> Result<String, RenderError> {
        Ok(self.page()?.content().await?)
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "Page close failed");
            }
        }
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.events.abort();
        closed?;
        tracing::info!("Browser session closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}
