//! End-to-end fan-out over the in-memory pool with simulated airlines.

use awardgrid_airline::{AirlineScraper, SimulatedScraper, SimulatedSettings};
use awardgrid_browser::testing::{StubLauncher, StubPage};
use awardgrid_browser::{PagePool, PoolLimits};
use awardgrid_core::{AirlineId, AirportCode, SearchQuery};
use awardgrid_search::{
    EventSink, OrchestratorSettings, RetryPolicy, SearchEvent, SearchOrchestrator,
};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

fn simulated(name: &str, id: &str, failure_rate: f64) -> Arc<dyn AirlineScraper<StubPage>> {
    Arc::new(SimulatedScraper::new(SimulatedSettings {
        id: AirlineId::new(id).expect("valid airline ID"),
        name: name.to_string(),
        failure_rate,
        response_time_ms: [0, 1],
    }))
}

fn query() -> SearchQuery {
    SearchQuery {
        origin: AirportCode::new("LHR").expect("valid code"),
        destination: AirportCode::new("JFK").expect("valid code"),
        center_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
    }
}

#[tokio::test]
async fn full_run_streams_and_settles() {
    let launcher = StubLauncher::new();
    let pool = PagePool::new(
        launcher.clone(),
        PoolLimits {
            max_browsers: 2,
            max_pages_per_browser: 2,
        },
    );
    let executor = awardgrid_search::SearchExecutor::new(
        pool.clone(),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
        },
    );
    let orchestrator = SearchOrchestrator::new(
        executor,
        vec![
            simulated("SimAirline1", "sim-airline-1", 0.0),
            simulated("SimAirline2", "sim-airline-2", 0.0),
            simulated("Broken", "broken-air", 1.0),
        ],
        OrchestratorSettings {
            sample_stride: 4,
            run_deadline: None,
        },
    );

    let (sink, mut rx) = EventSink::channel();
    let outcome = orchestrator.run(&query(), &sink).await;

    // 12 sampled combos per producer across 3 producers.
    assert_eq!(outcome.sampled, 12);
    assert_eq!(outcome.total, 36);
    assert_eq!(outcome.completed, 36);
    assert_eq!(outcome.successful, 24);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    // The failing producer errors exactly once per task.
    let errors = events
        .iter()
        .filter(|event| matches!(event, SearchEvent::Error { .. }))
        .count();
    assert_eq!(errors, 12);

    // Progress climbs to 100% and `complete` closes the stream.
    let last_progress = events
        .iter()
        .rev()
        .find_map(|event| match event {
            SearchEvent::ProgressUpdate {
                completed,
                percentage,
                ..
            } => Some((*completed, *percentage)),
            _ => None,
        })
        .expect("progress events present");
    assert_eq!(last_progress, (36, 100));
    assert!(matches!(events.last(), Some(SearchEvent::Complete { .. })));

    // Every update for a key strictly improves on the previous one.
    let mut best = std::collections::HashMap::new();
    for event in &events {
        if let SearchEvent::ResultUpdate { key, points, .. } = event {
            let points = points.expect("simulated results carry points");
            if let Some(previous) = best.insert(key.clone(), points) {
                assert!(points < previous, "update for {key:?} did not improve");
            }
        }
    }

    // No page leaked: everything returned to the pool within its caps.
    let stats = pool.stats().await;
    assert_eq!(stats.busy_pages, 0);
    assert_eq!(stats.queued_requests, 0);
    assert!(stats.available_pages <= 4);

    pool.shutdown().await;
    assert!(pool.acquire().await.is_err());
}
