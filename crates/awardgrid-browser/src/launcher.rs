//! The launcher seam between the page pool and the browser engine.
//!
//! `PageLauncher` covers everything the pool needs from a browser backend:
//! launching processes, opening and resetting pages, and tearing both down.
//! `ChromiumLauncher` is the production implementation on chromiumoxide.

use crate::error::{PoolError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Resolves (or is dropped) once the associated browser process has
/// disconnected. The pool watches it to prune dead browsers.
pub type DisconnectSignal = oneshot::Receiver<()>;

/// Backend capability consumed by [`crate::pool::PagePool`].
#[async_trait::async_trait]
pub trait PageLauncher: Send + Sync + 'static {
    /// One launched browser process.
    type Browser: Send + Sync + 'static;
    /// One page hosted by a browser process.
    type Page: Send + Sync + 'static;

    /// Launch a browser process.
    async fn launch_browser(&self) -> Result<(Self::Browser, DisconnectSignal)>;

    /// Open a fresh page in the given browser.
    async fn open_page(&self, browser: &Self::Browser) -> Result<Self::Page>;

    /// Reset a page to a neutral state between leases.
    async fn reset_page(&self, page: &Self::Page) -> Result<()>;

    /// Close a page. Failures are the implementation's to log.
    async fn close_page(&self, page: Self::Page);

    /// Close a browser process. Failures are the implementation's to log.
    async fn close_browser(&self, browser: &Self::Browser);
}

/// Chromium launch settings.
#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// A launched Chromium process.
///
/// The inner handle is behind a mutex because closing requires exclusive
/// access while page opening only needs shared access.
pub struct ChromiumBrowser {
    inner: Mutex<Browser>,
}

/// Production launcher backed by chromiumoxide.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    settings: ChromiumSettings,
}

impl ChromiumLauncher {
    /// Create a launcher with the given settings.
    #[must_use]
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl PageLauncher for ChromiumLauncher {
    type Browser = ChromiumBrowser;
    type Page = Page;

    async fn launch_browser(&self) -> Result<(Self::Browser, DisconnectSignal)> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.settings.window_width, self.settings.window_height)
            .args(vec![
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--disable-gpu",
            ]);
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| PoolError::Exhausted(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PoolError::Exhausted(format!("browser launch failed: {e}")))?;

        // The handler stream must be polled for the browser to make progress;
        // its end means the process disconnected.
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
            let _ = tx.send(());
        });

        Ok((
            ChromiumBrowser {
                inner: Mutex::new(browser),
            },
            rx,
        ))
    }

    async fn open_page(&self, browser: &Self::Browser) -> Result<Self::Page> {
        let guard = browser.inner.lock().await;
        guard
            .new_page("about:blank")
            .await
            .map_err(|e| PoolError::Exhausted(format!("page open failed: {e}")))
    }

    async fn reset_page(&self, page: &Self::Page) -> Result<()> {
        page.goto("about:blank")
            .await
            .map(|_| ())
            .map_err(|e| PoolError::Exhausted(format!("page reset failed: {e}")))
    }

    async fn close_page(&self, page: Self::Page) {
        if let Err(e) = page.close().await {
            debug!("failed to close page: {e}");
        }
    }

    async fn close_browser(&self, browser: &Self::Browser) {
        let mut guard = browser.inner.lock().await;
        if let Err(e) = guard.close().await {
            warn!("failed to close browser: {e}");
        }
    }
}
