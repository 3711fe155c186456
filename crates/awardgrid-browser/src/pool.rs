//! Bounded, elastic pool of browser pages with FIFO waiting.
//!
//! Pages are grouped under a bounded number of browser processes. The pool
//! grows on demand (a new page in a browser with spare capacity, a new
//! browser while under the cap) and queues callers in FIFO order once full.
//! All bookkeeping lives behind one mutex; capacity is reserved under the
//! lock before any allocation is awaited, so concurrent acquires can never
//! overshoot the configured maximum.

use crate::error::{PoolError, Result};
use crate::launcher::PageLauncher;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// Capacity limits for a [`PagePool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolLimits {
    /// Maximum number of browser processes
    pub max_browsers: usize,
    /// Maximum pages hosted by each browser process
    pub max_pages_per_browser: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_browsers: 3,
            max_pages_per_browser: 4,
        }
    }
}

impl PoolLimits {
    fn max_pages_total(self) -> usize {
        self.max_browsers * self.max_pages_per_browser
    }
}

/// Point-in-time pool utilization snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub browsers: usize,
    pub available_pages: usize,
    pub busy_pages: usize,
    pub queued_requests: usize,
}

/// An exclusive lease on one pooled page.
///
/// The lease is returned with [`PagePool::release`], which consumes it, so a
/// page can never be handed back twice. A lease dropped without release
/// permanently forfeits its capacity slot.
#[derive(Debug)]
pub struct PageLease<P> {
    page: P,
    page_id: u64,
    browser_id: u64,
}

impl<P> PageLease<P> {
    /// The leased page.
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Pool-unique id of the leased page.
    pub fn page_id(&self) -> u64 {
        self.page_id
    }

    fn from_idle(idle: IdlePage<P>) -> Self {
        Self {
            page: idle.page,
            page_id: idle.page_id,
            browser_id: idle.browser_id,
        }
    }

    fn into_idle(self) -> IdlePage<P> {
        IdlePage {
            page: self.page,
            page_id: self.page_id,
            browser_id: self.browser_id,
        }
    }
}

struct IdlePage<P> {
    page: P,
    page_id: u64,
    browser_id: u64,
}

struct BrowserSlot<B> {
    handle: Arc<B>,
    /// Pages existing in this browser, counting in-flight opens.
    pages_open: usize,
}

type Waiter<P> = oneshot::Sender<Result<PageLease<P>>>;

struct PoolState<L: PageLauncher> {
    browsers: HashMap<u64, BrowserSlot<L::Browser>>,
    available: VecDeque<IdlePage<L::Page>>,
    busy: usize,
    /// Page slots reserved for allocations still in flight.
    pending_pages: usize,
    /// Browser launches still in flight.
    pending_browsers: usize,
    waiters: VecDeque<Waiter<L::Page>>,
    shutting_down: bool,
    next_browser_id: u64,
    next_page_id: u64,
}

impl<L: PageLauncher> PoolState<L> {
    /// Every page slot spoken for: idle, leased, or being created.
    fn total_commitment(&self) -> usize {
        self.available.len() + self.busy + self.pending_pages
    }
}

struct PoolInner<L: PageLauncher> {
    launcher: L,
    limits: PoolLimits,
    state: Mutex<PoolState<L>>,
}

/// Bounded elastic page pool. Cheap to clone; all clones share state.
pub struct PagePool<L: PageLauncher> {
    inner: Arc<PoolInner<L>>,
}

impl<L: PageLauncher> Clone for PagePool<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum AcquirePlan<P> {
    Ready(PageLease<P>),
    Wait(oneshot::Receiver<Result<PageLease<P>>>),
    Create,
}

enum Placement<B> {
    Existing(u64, Arc<B>),
    Launch,
}

impl<L: PageLauncher> PagePool<L> {
    /// Create an empty pool. No browser is launched until demanded (see
    /// [`PagePool::prewarm`] for warming ahead of traffic).
    pub fn new(launcher: L, limits: PoolLimits) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                launcher,
                limits,
                state: Mutex::new(PoolState {
                    browsers: HashMap::new(),
                    available: VecDeque::new(),
                    busy: 0,
                    pending_pages: 0,
                    pending_browsers: 0,
                    waiters: VecDeque::new(),
                    shutting_down: false,
                    next_browser_id: 0,
                    next_page_id: 0,
                }),
            }),
        }
    }

    /// Acquire a page lease.
    ///
    /// Reuses an idle page when one exists, grows the pool while under
    /// capacity, and otherwise suspends the caller in FIFO order until a
    /// release frees a page. Waiting is not an error.
    ///
    /// # Errors
    /// `PoolError::Exhausted` if an allocation itself fails;
    /// `PoolError::ShuttingDown` after [`PagePool::shutdown`].
    pub async fn acquire(&self) -> Result<PageLease<L::Page>> {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.shutting_down {
                return Err(PoolError::ShuttingDown);
            }

            if state.waiters.is_empty() {
                if let Some(idle) = state.available.pop_front() {
                    state.busy += 1;
                    AcquirePlan::Ready(PageLease::from_idle(idle))
                } else if state.total_commitment() < self.inner.limits.max_pages_total() {
                    state.pending_pages += 1;
                    AcquirePlan::Create
                } else {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    AcquirePlan::Wait(rx)
                }
            } else {
                // Queue behind earlier waiters to keep FIFO order, and make
                // sure any freed capacity is being turned into pages for them.
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                self.replenish_for_waiters(&mut state);
                AcquirePlan::Wait(rx)
            }
        };

        match plan {
            AcquirePlan::Ready(lease) => Ok(lease),
            AcquirePlan::Wait(rx) => rx.await.map_err(|_| PoolError::ShuttingDown)?,
            AcquirePlan::Create => {
                // Holds one pending_pages reservation.
                match self.build_page().await {
                    Ok(idle) => {
                        let mut state = self.inner.state.lock().await;
                        state.pending_pages -= 1;
                        if state.shutting_down {
                            drop(state);
                            self.inner.launcher.close_page(idle.page).await;
                            return Err(PoolError::ShuttingDown);
                        }
                        state.busy += 1;
                        Ok(PageLease::from_idle(idle))
                    }
                    Err(e) => {
                        let mut state = self.inner.state.lock().await;
                        state.pending_pages -= 1;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Return a leased page to the pool.
    ///
    /// The page is reset to a neutral state best-effort; a reset failure is
    /// logged and the page is returned regardless, so leases are never
    /// leaked. The oldest pending waiter, if any, is handed the page
    /// immediately.
    pub async fn release(&self, lease: PageLease<L::Page>) {
        let IdlePage {
            page,
            page_id,
            browser_id,
        } = lease.into_idle();

        if let Err(e) = self.inner.launcher.reset_page(&page).await {
            warn!(page_id, "failed to reset page, returning it anyway: {e}");
        }

        let to_close = {
            let mut state = self.inner.state.lock().await;
            state.busy -= 1;
            if state.shutting_down {
                Some(page)
            } else if state.browsers.contains_key(&browser_id) {
                self.hand_off_locked(
                    &mut state,
                    IdlePage {
                        page,
                        page_id,
                        browser_id,
                    },
                )
            } else {
                // The host browser disconnected while this page was leased;
                // the page is dead, but its slot frees capacity for waiters.
                debug!(page_id, browser_id, "dropping page of disconnected browser");
                self.replenish_for_waiters(&mut state);
                Some(page)
            }
        };

        if let Some(page) = to_close {
            self.inner.launcher.close_page(page).await;
        }
    }

    /// Open `count` pages ahead of demand (bounded by capacity).
    ///
    /// # Errors
    /// Propagates the first allocation failure.
    pub async fn prewarm(&self, count: usize) -> Result<()> {
        for _ in 0..count {
            let reserved = {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return Err(PoolError::ShuttingDown);
                }
                if state.total_commitment() < self.inner.limits.max_pages_total() {
                    state.pending_pages += 1;
                    true
                } else {
                    false
                }
            };
            if !reserved {
                break;
            }

            match self.build_page().await {
                Ok(idle) => {
                    let to_close = {
                        let mut state = self.inner.state.lock().await;
                        state.pending_pages -= 1;
                        self.hand_off_locked(&mut state, idle)
                    };
                    if let Some(page) = to_close {
                        self.inner.launcher.close_page(page).await;
                    }
                }
                Err(e) => {
                    let mut state = self.inner.state.lock().await;
                    state.pending_pages -= 1;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Tear the pool down.
    ///
    /// All queued waiters fail with `ShuttingDown`, idle pages and browsers
    /// are closed, and later acquires fail fast. Outstanding leases stay
    /// valid until released, at which point their pages are closed.
    pub async fn shutdown(&self) {
        info!("shutting down browser pool");
        let (waiters, pages, browsers) = {
            let mut state = self.inner.state.lock().await;
            state.shutting_down = true;
            let waiters: Vec<_> = state.waiters.drain(..).collect();
            let pages: Vec<_> = state.available.drain(..).map(|idle| idle.page).collect();
            let browsers: Vec<_> = state
                .browsers
                .drain()
                .map(|(_, slot)| slot.handle)
                .collect();
            (waiters, pages, browsers)
        };

        for waiter in waiters {
            let _ = waiter.send(Err(PoolError::ShuttingDown));
        }
        for page in pages {
            self.inner.launcher.close_page(page).await;
        }
        for browser in &browsers {
            self.inner.launcher.close_browser(browser).await;
        }
    }

    /// Snapshot current utilization.
    pub async fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().await;
        PoolStats {
            browsers: state.browsers.len(),
            available_pages: state.available.len(),
            busy_pages: state.busy,
            queued_requests: state.waiters.len(),
        }
    }

    /// Hand a free page to the oldest live waiter, else shelve it.
    ///
    /// Returns the page back when the pool is shutting down so the caller
    /// can close it outside the lock.
    fn hand_off_locked(
        &self,
        state: &mut PoolState<L>,
        idle: IdlePage<L::Page>,
    ) -> Option<L::Page> {
        if state.shutting_down {
            return Some(idle.page);
        }

        let mut idle = idle;
        while let Some(waiter) = state.waiters.pop_front() {
            state.busy += 1;
            match waiter.send(Ok(PageLease::from_idle(idle))) {
                Ok(()) => return None,
                Err(rejected) => {
                    // Waiter gave up; reclaim the lease and try the next one.
                    state.busy -= 1;
                    match rejected {
                        Ok(lease) => idle = lease.into_idle(),
                        Err(_) => unreachable!("hand-off always sends Ok"),
                    }
                }
            }
        }

        state.available.push_back(idle);
        None
    }

    /// Turn freed capacity into pages for queued waiters.
    ///
    /// Reserves one page slot per waiter not already covered by an in-flight
    /// allocation and spawns the builds in the background.
    fn replenish_for_waiters(&self, state: &mut PoolState<L>) {
        while !state.waiters.is_empty()
            && state.pending_pages < state.waiters.len()
            && state.total_commitment() < self.inner.limits.max_pages_total()
        {
            state.pending_pages += 1;
            let pool = self.clone();
            tokio::spawn(async move {
                pool.replenish().await;
            });
        }
    }

    /// Background build of one page for the waiter queue.
    async fn replenish(&self) {
        match self.build_page().await {
            Ok(idle) => {
                let to_close = {
                    let mut state = self.inner.state.lock().await;
                    state.pending_pages -= 1;
                    self.hand_off_locked(&mut state, idle)
                };
                if let Some(page) = to_close {
                    self.inner.launcher.close_page(page).await;
                }
            }
            Err(e) => {
                let failed_waiter = {
                    let mut state = self.inner.state.lock().await;
                    state.pending_pages -= 1;
                    state.waiters.pop_front()
                };
                // Allocation failure propagates to the oldest waiter rather
                // than leaving it suspended forever.
                if let Some(waiter) = failed_waiter {
                    warn!("page allocation for queued request failed: {e}");
                    let _ = waiter.send(Err(e));
                } else {
                    debug!("page allocation failed with no waiter left: {e}");
                }
            }
        }
    }

    /// Create one page, launching a new browser if every existing one is at
    /// capacity. The caller holds a `pending_pages` reservation.
    async fn build_page(&self) -> Result<IdlePage<L::Page>> {
        let placement = {
            let mut state = self.inner.state.lock().await;
            if state.shutting_down {
                return Err(PoolError::ShuttingDown);
            }

            let mut placement = None;
            for (id, slot) in &mut state.browsers {
                if slot.pages_open < self.inner.limits.max_pages_per_browser {
                    slot.pages_open += 1;
                    placement = Some(Placement::Existing(*id, Arc::clone(&slot.handle)));
                    break;
                }
            }

            match placement {
                Some(placement) => placement,
                None => {
                    if state.browsers.len() + state.pending_browsers
                        < self.inner.limits.max_browsers
                    {
                        state.pending_browsers += 1;
                        Placement::Launch
                    } else {
                        return Err(PoolError::Exhausted(
                            "no browser has page capacity left".to_string(),
                        ));
                    }
                }
            }
        };

        match placement {
            Placement::Existing(browser_id, handle) => {
                self.open_page_in(browser_id, &handle).await
            }
            Placement::Launch => {
                // Holds one pending_browsers reservation.
                let (browser, disconnect) = match self.inner.launcher.launch_browser().await {
                    Ok(launched) => launched,
                    Err(e) => {
                        let mut state = self.inner.state.lock().await;
                        state.pending_browsers -= 1;
                        return Err(e);
                    }
                };

                let handle = Arc::new(browser);
                let browser_id = {
                    let mut state = self.inner.state.lock().await;
                    state.pending_browsers -= 1;
                    if state.shutting_down {
                        drop(state);
                        self.inner.launcher.close_browser(&handle).await;
                        return Err(PoolError::ShuttingDown);
                    }
                    let id = state.next_browser_id;
                    state.next_browser_id += 1;
                    state.browsers.insert(
                        id,
                        BrowserSlot {
                            handle: Arc::clone(&handle),
                            pages_open: 1,
                        },
                    );
                    id
                };
                debug!(browser_id, "launched browser");

                let pool = self.clone();
                tokio::spawn(async move {
                    let _ = disconnect.await;
                    pool.handle_disconnect(browser_id).await;
                });

                self.open_page_in(browser_id, &handle).await
            }
        }
    }

    /// Open a page in a browser whose `pages_open` was already reserved.
    async fn open_page_in(
        &self,
        browser_id: u64,
        handle: &Arc<L::Browser>,
    ) -> Result<IdlePage<L::Page>> {
        match self.inner.launcher.open_page(handle).await {
            Ok(page) => {
                let mut state = self.inner.state.lock().await;
                if !state.browsers.contains_key(&browser_id) {
                    // Disconnected mid-open; the page is already dead.
                    drop(state);
                    self.inner.launcher.close_page(page).await;
                    return Err(PoolError::Exhausted(
                        "browser disconnected while opening page".to_string(),
                    ));
                }
                let page_id = state.next_page_id;
                state.next_page_id += 1;
                Ok(IdlePage {
                    page,
                    page_id,
                    browser_id,
                })
            }
            Err(e) => {
                let mut state = self.inner.state.lock().await;
                if let Some(slot) = state.browsers.get_mut(&browser_id) {
                    slot.pages_open -= 1;
                }
                Err(e)
            }
        }
    }

    /// Remove a disconnected browser and its idle pages so allocation never
    /// routes to it again. Leased pages of the browser are dropped on
    /// release.
    async fn handle_disconnect(&self, browser_id: u64) {
        let orphaned = {
            let mut state = self.inner.state.lock().await;
            if state.browsers.remove(&browser_id).is_none() {
                return;
            }
            warn!(browser_id, "browser disconnected, removing from pool");

            let mut kept = VecDeque::new();
            let mut orphaned = Vec::new();
            while let Some(idle) = state.available.pop_front() {
                if idle.browser_id == browser_id {
                    orphaned.push(idle.page);
                } else {
                    kept.push_back(idle);
                }
            }
            state.available = kept;

            // The vanished pages freed capacity for anyone queued.
            self.replenish_for_waiters(&mut state);
            orphaned
        };

        for page in orphaned {
            self.inner.launcher.close_page(page).await;
        }
    }
}
