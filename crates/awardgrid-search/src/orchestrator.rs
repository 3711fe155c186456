//! Fan-out orchestration of airline searches over the date grid.
//!
//! All producers run concurrently; each works through its sampled task list
//! sequentially, one page lease at a time, with the executor retrying
//! individual tasks. Results merge into one keyed map under a
//! strictly-better price rule, so the stream only ever improves per key.
//! One task failing never disturbs its siblings.

use crate::date_grid::{DateCombo, DateGrid};
use crate::events::{ProducerPhase, SearchEvent};
use crate::retry::{SearchExecutor, TaskReport};
use crate::stream::EventSink;
use awardgrid_airline::{AirlineScraper, FlightResult};
use awardgrid_browser::{PageLauncher, PagePool};
use awardgrid_core::{DatePairKey, SearchParams, SearchQuery};
use futures::stream::{FuturesUnordered, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Knobs for one orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Date grid sampling stride (see [`DateGrid::sampled`])
    pub sample_stride: usize,
    /// Wall-clock budget for a whole run; checked between tasks, so an
    /// in-flight task always finishes. `None` leaves the run unbounded.
    pub run_deadline: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            run_deadline: Some(Duration::from_secs(600)),
        }
    }
}

/// Best-known result for one date-pair key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub key: DatePairKey,
    /// Price display string, e.g. "75k + £345"
    pub price: String,
    /// Comparison metric behind the display
    pub points: Option<u64>,
    pub airline: String,
    pub outbound: String,
    #[serde(rename = "return")]
    pub return_label: String,
}

/// Final aggregate of one run.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Best result per key
    pub cells: HashMap<DatePairKey, GridCell>,
    /// Tasks attempted (success or failure)
    pub completed: usize,
    /// Producers × tasks per producer
    pub total: usize,
    /// Tasks whose search succeeded
    pub successful: usize,
    /// Tasks per producer after sampling
    pub sampled: usize,
}

struct RunState {
    cells: HashMap<DatePairKey, GridCell>,
    completed: usize,
    successful: usize,
}

/// Coordinates the full fan-out for one route query.
pub struct SearchOrchestrator<L: PageLauncher> {
    executor: SearchExecutor<L>,
    scrapers: Vec<Arc<dyn AirlineScraper<L::Page>>>,
    settings: OrchestratorSettings,
}

impl<L: PageLauncher> SearchOrchestrator<L> {
    pub fn new(
        executor: SearchExecutor<L>,
        scrapers: Vec<Arc<dyn AirlineScraper<L::Page>>>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            executor,
            scrapers,
            settings,
        }
    }

    /// The pool backing this orchestrator's executor.
    pub fn pool(&self) -> &PagePool<L> {
        self.executor.pool()
    }

    /// Number of registered producers.
    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.scrapers.len()
    }

    /// Run a full search: build and sample the date grid, announce the run,
    /// fan out, and emit `complete` as the final event.
    pub async fn run(&self, query: &SearchQuery, sink: &EventSink) -> SearchOutcome {
        let grid = DateGrid::around(query.center_date);
        let combos = grid.sampled(self.settings.sample_stride);

        sink.publish(SearchEvent::status("Starting search..."));
        sink.publish(SearchEvent::Progress {
            message: format!(
                "Searching {} date combinations across {} airlines...",
                combos.len(),
                self.scrapers.len()
            ),
            total_combinations: combos.len(),
            total_airlines: self.scrapers.len(),
        });

        self.run_sampled(query, combos, sink).await
    }

    /// Fan a fixed task list out across all producers.
    pub async fn run_sampled(
        &self,
        query: &SearchQuery,
        combos: Vec<DateCombo>,
        sink: &EventSink,
    ) -> SearchOutcome {
        let run_id = Uuid::new_v4();
        let total = combos.len() * self.scrapers.len();
        info!(
            %run_id,
            origin = %query.origin,
            destination = %query.destination,
            producers = self.scrapers.len(),
            tasks_per_producer = combos.len(),
            "starting search fan-out"
        );

        let deadline = self
            .settings
            .run_deadline
            .map(|budget| tokio::time::Instant::now() + budget);
        let state = Mutex::new(RunState {
            cells: HashMap::new(),
            completed: 0,
            successful: 0,
        });

        let mut producers: FuturesUnordered<_> = self
            .scrapers
            .iter()
            .map(|scraper| {
                self.run_producer(scraper.as_ref(), query, &combos, total, &state, sink, deadline)
            })
            .collect();
        while producers.next().await.is_some() {}
        drop(producers);

        let state = state.into_inner();
        if state.completed < total {
            warn!(
                %run_id,
                completed = state.completed,
                total,
                "run deadline reached before all tasks were attempted"
            );
            sink.publish(SearchEvent::Error {
                airline: None,
                key: None,
                message: format!(
                    "search deadline exceeded after {} of {total} tasks",
                    state.completed
                ),
            });
        }

        let pool_stats = self.pool().stats().await;
        sink.publish(SearchEvent::complete(state.cells.len(), pool_stats));
        info!(
            %run_id,
            results = state.cells.len(),
            completed = state.completed,
            successful = state.successful,
            "search run finished"
        );

        SearchOutcome {
            sampled: combos.len(),
            cells: state.cells,
            completed: state.completed,
            total,
            successful: state.successful,
        }
    }

    /// One producer's sequential pass over the task list.
    #[allow(clippy::too_many_arguments)]
    async fn run_producer(
        &self,
        scraper: &dyn AirlineScraper<L::Page>,
        query: &SearchQuery,
        combos: &[DateCombo],
        total: usize,
        state: &Mutex<RunState>,
        sink: &EventSink,
        deadline: Option<tokio::time::Instant>,
    ) {
        sink.publish(SearchEvent::ProducerStatus {
            airline: scraper.name().to_string(),
            status: ProducerPhase::Starting,
            message: format!("{}: Starting search...", scraper.name()),
        });

        for combo in combos {
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        airline = scraper.name(),
                        "run deadline reached; abandoning remaining tasks"
                    );
                    break;
                }
            }

            let params = SearchParams {
                origin: query.origin.clone(),
                destination: query.destination.clone(),
                outbound_date: combo.outbound,
                return_date: Some(combo.return_date),
            };

            match self.executor.execute(scraper, &params).await {
                TaskReport::Success { results, .. } => {
                    let mut state = state.lock().await;
                    state.successful += 1;
                    if let Some(best) = results.first() {
                        self.merge_result(&mut state, combo, scraper.name(), best, sink);
                    }
                    Self::finish_task(&mut state, total, sink);
                }
                TaskReport::Failure { error, attempts } => {
                    debug!(
                        airline = scraper.name(),
                        key = %combo.key,
                        attempts,
                        "task failed: {error}"
                    );
                    sink.publish(SearchEvent::Error {
                        airline: Some(scraper.name().to_string()),
                        key: Some(combo.key.clone()),
                        message: format!(
                            "{}: Search failed for {} - {}",
                            scraper.name(),
                            combo.outbound_label,
                            combo.return_label
                        ),
                    });
                    let mut state = state.lock().await;
                    Self::finish_task(&mut state, total, sink);
                }
            }
        }

        sink.publish(SearchEvent::ProducerStatus {
            airline: scraper.name().to_string(),
            status: ProducerPhase::Completed,
            message: format!("{}: Search completed", scraper.name()),
        });
    }

    /// Replace the keyed cell when the candidate strictly improves on it,
    /// emitting a `result-update`.
    fn merge_result(
        &self,
        state: &mut RunState,
        combo: &DateCombo,
        airline: &str,
        best: &FlightResult,
        sink: &EventSink,
    ) {
        let metric = price_metric(best);
        if !improves(metric, state.cells.get(&combo.key)) {
            return;
        }

        let cell = GridCell {
            key: combo.key.clone(),
            price: best.price.display.clone(),
            points: metric,
            airline: airline.to_string(),
            outbound: combo.outbound_label.clone(),
            return_label: combo.return_label.clone(),
        };
        sink.publish(SearchEvent::ResultUpdate {
            key: cell.key.clone(),
            price: cell.price.clone(),
            points: cell.points,
            airline: cell.airline.clone(),
            outbound: cell.outbound.clone(),
            return_label: cell.return_label.clone(),
        });
        state.cells.insert(combo.key.clone(), cell);
    }

    /// Count one finished task and publish progress while still holding the
    /// state lock, keeping the counter monotonic on the stream.
    fn finish_task(state: &mut RunState, total: usize, sink: &EventSink) {
        state.completed += 1;
        sink.publish(SearchEvent::ProgressUpdate {
            completed: state.completed,
            total,
            percentage: percentage(state.completed, total),
        });
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

/// Comparison metric for a result: the structured points total when present,
/// else a parse of the display string.
fn price_metric(result: &FlightResult) -> Option<u64> {
    result
        .price
        .points
        .or_else(|| parse_display_metric(&result.price.display))
}

/// Fallback metric extraction from a display string: a leading `<N>k` reads
/// as N×1000, else a leading bare integer; anything else is incomparable.
fn parse_display_metric(text: &str) -> Option<u64> {
    static KILO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[kK]").expect("valid regex"));
    static BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

    if let Some(caps) = KILO.captures(text) {
        return caps[1].parse::<u64>().ok().map(|n| n * 1000);
    }
    BARE.captures(text).and_then(|caps| caps[1].parse().ok())
}

/// Strictly-better rule: any candidate beats an absent entry or an entry
/// without a metric; otherwise only a numerically smaller metric wins.
/// An unparseable candidate never displaces anything.
fn improves(candidate: Option<u64>, current: Option<&GridCell>) -> bool {
    match current {
        None => true,
        Some(cell) => match (candidate, cell.points) {
            (Some(new), Some(old)) => new < old,
            (Some(_), None) => true,
            (None, _) => false,
        },
    }
}
