//! In-memory launcher for exercising pool behavior without Chromium.
//!
//! Used by this crate's tests and by downstream crates that test executor
//! and orchestrator logic against a real pool.

use crate::error::{PoolError, Result};
use crate::launcher::{DisconnectSignal, PageLauncher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// A fake browser process.
#[derive(Debug)]
pub struct StubBrowser {
    id: u64,
}

/// A fake page.
#[derive(Debug)]
pub struct StubPage {
    id: u64,
    browser: u64,
}

impl StubPage {
    /// Stub-assigned page id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stub-assigned id of the hosting browser.
    pub fn browser(&self) -> u64 {
        self.browser
    }
}

#[derive(Default)]
struct StubCounters {
    launches: AtomicUsize,
    opens: AtomicUsize,
    resets: AtomicUsize,
    closed_pages: AtomicUsize,
    closed_browsers: AtomicUsize,
}

#[derive(Default)]
struct StubState {
    next_browser: AtomicU64,
    next_page: AtomicU64,
    counters: StubCounters,
    fail_launches: AtomicBool,
    fail_opens: AtomicBool,
    fail_resets: AtomicBool,
    disconnects: Mutex<HashMap<u64, oneshot::Sender<()>>>,
}

/// Launcher whose browsers and pages are plain in-memory values.
///
/// Clones share state, so a test can keep a handle for counters and fault
/// injection after moving one clone into the pool.
#[derive(Clone, Default)]
pub struct StubLauncher {
    state: Arc<StubState>,
}

impl StubLauncher {
    /// Create a fresh stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent browser launches fail.
    pub fn fail_launches(&self, on: bool) {
        self.state.fail_launches.store(on, Ordering::SeqCst);
    }

    /// Make subsequent page opens fail.
    pub fn fail_opens(&self, on: bool) {
        self.state.fail_opens.store(on, Ordering::SeqCst);
    }

    /// Make subsequent page resets fail.
    pub fn fail_resets(&self, on: bool) {
        self.state.fail_resets.store(on, Ordering::SeqCst);
    }

    /// Simulate a browser process dying. Returns false for unknown ids.
    pub fn disconnect(&self, browser_id: u64) -> bool {
        let sender = self
            .state
            .disconnects
            .lock()
            .expect("disconnect map lock")
            .remove(&browser_id);
        match sender {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Browsers launched so far.
    pub fn launches(&self) -> usize {
        self.state.counters.launches.load(Ordering::SeqCst)
    }

    /// Pages opened so far.
    pub fn opens(&self) -> usize {
        self.state.counters.opens.load(Ordering::SeqCst)
    }

    /// Page resets attempted so far.
    pub fn resets(&self) -> usize {
        self.state.counters.resets.load(Ordering::SeqCst)
    }

    /// Pages closed so far.
    pub fn closed_pages(&self) -> usize {
        self.state.counters.closed_pages.load(Ordering::SeqCst)
    }

    /// Browsers closed so far.
    pub fn closed_browsers(&self) -> usize {
        self.state.counters.closed_browsers.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PageLauncher for StubLauncher {
    type Browser = StubBrowser;
    type Page = StubPage;

    async fn launch_browser(&self) -> Result<(Self::Browser, DisconnectSignal)> {
        if self.state.fail_launches.load(Ordering::SeqCst) {
            return Err(PoolError::Exhausted("stub launch failure".to_string()));
        }
        let id = self.state.next_browser.fetch_add(1, Ordering::SeqCst);
        self.state.counters.launches.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        self.state
            .disconnects
            .lock()
            .expect("disconnect map lock")
            .insert(id, tx);

        Ok((StubBrowser { id }, rx))
    }

    async fn open_page(&self, browser: &Self::Browser) -> Result<Self::Page> {
        if self.state.fail_opens.load(Ordering::SeqCst) {
            return Err(PoolError::Exhausted("stub page open failure".to_string()));
        }
        let id = self.state.next_page.fetch_add(1, Ordering::SeqCst);
        self.state.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(StubPage {
            id,
            browser: browser.id,
        })
    }

    async fn reset_page(&self, _page: &Self::Page) -> Result<()> {
        self.state.counters.resets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_resets.load(Ordering::SeqCst) {
            return Err(PoolError::Exhausted("stub reset failure".to_string()));
        }
        Ok(())
    }

    async fn close_page(&self, _page: Self::Page) {
        self.state
            .counters
            .closed_pages
            .fetch_add(1, Ordering::SeqCst);
    }

    async fn close_browser(&self, browser: &Self::Browser) {
        self.state
            .counters
            .closed_browsers
            .fetch_add(1, Ordering::SeqCst);
        // Dropping the sender fires the disconnect signal, which the pool
        // ignores for browsers it already removed.
        self.state
            .disconnects
            .lock()
            .expect("disconnect map lock")
            .remove(&browser.id);
    }
}
