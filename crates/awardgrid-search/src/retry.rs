//! Retrying task executor.
//!
//! Wraps one fallible search against a pooled page with bounded retries and
//! exponential backoff, and guarantees the page goes back to the pool on
//! every exit path. Failing to get a page at all counts as a failed attempt
//! like any other.

use crate::error::SearchError;
use awardgrid_airline::{AirlineScraper, FlightResult};
use awardgrid_browser::{PageLauncher, PagePool};
use awardgrid_core::SearchParams;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt after `attempt`: `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Terminal outcome of one task: a result or an exhausted retry budget.
/// Failure is data, not an `Err` — callers inspect it.
#[derive(Debug)]
pub enum TaskReport {
    Success {
        results: Vec<FlightResult>,
        attempt: u32,
    },
    Failure {
        error: SearchError,
        attempts: u32,
    },
}

/// Runs producer searches against the pool under a retry policy.
pub struct SearchExecutor<L: PageLauncher> {
    pool: PagePool<L>,
    policy: RetryPolicy,
}

impl<L: PageLauncher> Clone for SearchExecutor<L> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            policy: self.policy,
        }
    }
}

impl<L: PageLauncher> SearchExecutor<L> {
    /// Create an executor. A zero `max_attempts` is bumped to one.
    pub fn new(pool: PagePool<L>, mut policy: RetryPolicy) -> Self {
        policy.max_attempts = policy.max_attempts.max(1);
        Self { pool, policy }
    }

    /// The pool this executor draws pages from.
    pub fn pool(&self) -> &PagePool<L> {
        &self.pool
    }

    /// Run one task to its terminal outcome.
    ///
    /// Each attempt acquires a page, runs the producer's search, and
    /// releases the page whether the search succeeded or not. Success
    /// short-circuits the remaining attempts; the final failure is returned
    /// without a trailing delay.
    pub async fn execute(
        &self,
        scraper: &dyn AirlineScraper<L::Page>,
        params: &SearchParams,
    ) -> TaskReport {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            let started = tokio::time::Instant::now();
            let outcome = match self.pool.acquire().await {
                Ok(lease) => {
                    let result = scraper.search(params, lease.page()).await;
                    // Page lifecycle is decoupled from the search outcome.
                    self.pool.release(lease).await;
                    result.map_err(SearchError::from)
                }
                Err(e) => Err(SearchError::from(e)),
            };

            match outcome {
                Ok(results) => {
                    debug!(
                        airline = scraper.name(),
                        attempt,
                        elapsed = ?started.elapsed(),
                        "search attempt succeeded"
                    );
                    return TaskReport::Success { results, attempt };
                }
                Err(error) => {
                    warn!(
                        airline = scraper.name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        elapsed = ?started.elapsed(),
                        "search attempt failed: {error}"
                    );
                    last_error = Some(error);
                    if attempt < self.policy.max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        debug!(airline = scraper.name(), "waiting {delay:?} before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        TaskReport::Failure {
            error: last_error.expect("at least one attempt always runs"),
            attempts: self.policy.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awardgrid_airline::{Availability, PriceQuote, ScrapeError};
    use awardgrid_browser::testing::{StubLauncher, StubPage};
    use awardgrid_browser::PoolLimits;
    use awardgrid_core::{AirlineId, AirportCode};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedScraper {
        id: AirlineId,
        /// Attempts that fail before the first success; u32::MAX never succeeds.
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl ScriptedScraper {
        fn failing_forever() -> Self {
            Self::new(u32::MAX)
        }

        fn new(failures_before_success: u32) -> Self {
            Self {
                id: AirlineId::new("scripted").expect("valid airline ID"),
                failures_before_success,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AirlineScraper<StubPage> for ScriptedScraper {
        fn id(&self) -> &AirlineId {
            &self.id
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        async fn search(
            &self,
            params: &SearchParams,
            _page: &StubPage,
        ) -> awardgrid_airline::Result<Vec<FlightResult>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(ScrapeError::Timeout("scripted failure".to_string()));
            }
            Ok(vec![FlightResult {
                airline: "Scripted".to_string(),
                outbound_date: params.outbound_date,
                return_date: params.return_date,
                price: PriceQuote::from_points(80_000, None),
                outbound_segments: vec![],
                return_segments: vec![],
                duration: None,
                stops: 0,
                aircraft: None,
                booking_class: "Economy".to_string(),
                availability: Availability::Available,
            }])
        }
    }

    fn params() -> SearchParams {
        SearchParams {
            origin: AirportCode::new("LHR").expect("valid code"),
            destination: AirportCode::new("JFK").expect("valid code"),
            outbound_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date")),
        }
    }

    fn executor(policy: RetryPolicy) -> (SearchExecutor<StubLauncher>, StubLauncher) {
        let launcher = StubLauncher::new();
        let pool = PagePool::new(launcher.clone(), PoolLimits::default());
        (SearchExecutor::new(pool, policy), launcher)
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_exhausts_attempts() {
        let (executor, launcher) = executor(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        });
        let scraper = ScriptedScraper::failing_forever();

        let start = tokio::time::Instant::now();
        let report = executor.execute(&scraper, &params()).await;

        // Exactly 3 attempts, 1000 + 2000 ms of scheduled backoff, and the
        // page released (reset) once per attempt.
        match report {
            TaskReport::Failure { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(error, SearchError::Scrape(_)));
            }
            TaskReport::Success { .. } => panic!("scripted scraper never succeeds"),
        }
        assert_eq!(scraper.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
        assert_eq!(launcher.resets(), 3);

        let stats = executor.pool().stats().await;
        assert_eq!(stats.busy_pages, 0);
        assert_eq!(stats.available_pages, 1);
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let (executor, launcher) = executor(RetryPolicy::default());
        let scraper = ScriptedScraper::new(0);

        let report = executor.execute(&scraper, &params()).await;
        match report {
            TaskReport::Success { attempt, results } => {
                assert_eq!(attempt, 1);
                assert_eq!(results.len(), 1);
            }
            TaskReport::Failure { .. } => panic!("first attempt succeeds"),
        }
        assert_eq!(scraper.calls(), 1);
        assert_eq!(launcher.resets(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let (executor, launcher) = executor(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        });
        let scraper = ScriptedScraper::new(2);

        let report = executor.execute(&scraper, &params()).await;
        match report {
            TaskReport::Success { attempt, .. } => assert_eq!(attempt, 3),
            TaskReport::Failure { .. } => panic!("third attempt succeeds"),
        }
        // Released exactly once per attempt, success or not.
        assert_eq!(launcher.resets(), 3);
        assert_eq!(executor.pool().stats().await.busy_pages, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_failure_counts_as_attempt() {
        let (executor, launcher) = executor(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        });
        launcher.fail_launches(true);
        let scraper = ScriptedScraper::new(0);

        let start = tokio::time::Instant::now();
        let report = executor.execute(&scraper, &params()).await;

        match report {
            TaskReport::Failure { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(error, SearchError::Pool(_)));
            }
            TaskReport::Success { .. } => panic!("acquisition never succeeds"),
        }
        // The scraper never ran, but backoff was still honored.
        assert_eq!(scraper.calls(), 0);
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
        assert_eq!(launcher.resets(), 0);
    }

    #[tokio::test]
    async fn test_zero_attempts_is_bumped_to_one() {
        let (executor, _launcher) = executor(RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        });
        let scraper = ScriptedScraper::new(0);

        match executor.execute(&scraper, &params()).await {
            TaskReport::Success { attempt, .. } => assert_eq!(attempt, 1),
            TaskReport::Failure { .. } => panic!("single attempt succeeds"),
        }
    }
}
