//! Simulated airline producer for demos and tests.
//!
//! Behaves like a real scraper from the outside — variable response times,
//! a configurable failure rate, plausible priced results — without touching
//! the page it is handed, so it runs against any pool backend.

use crate::error::{Result, ScrapeError};
use crate::result::{
    sort_cheapest_first, Availability, FlightResult, FlightSegment, PriceQuote,
};
use crate::scraper::AirlineScraper;
use awardgrid_core::{AirlineId, AirportCode, SearchParams};
use rand::Rng;
use std::time::Duration;
use tracing::debug;

const AIRCRAFT: [&str; 6] = [
    "Boeing 777-300ER",
    "Boeing 787-9",
    "Airbus A350-900",
    "Airbus A380-800",
    "Boeing 747-8",
    "Airbus A330-300",
];

/// Tuning for one simulated airline.
#[derive(Debug, Clone)]
pub struct SimulatedSettings {
    pub id: AirlineId,
    pub name: String,
    /// Probability a search fails (0.0..=1.0)
    pub failure_rate: f64,
    /// [min, max] simulated search time in milliseconds
    pub response_time_ms: [u64; 2],
}

pub struct SimulatedScraper {
    settings: SimulatedSettings,
}

impl SimulatedScraper {
    /// Build from explicit settings. The failure rate is clamped to 0..=1.
    #[must_use]
    pub fn new(mut settings: SimulatedSettings) -> Self {
        settings.failure_rate = settings.failure_rate.clamp(0.0, 1.0);
        Self { settings }
    }

    /// Convenience constructor for a fleet of numbered simulated airlines,
    /// each a bit slower than the previous.
    #[must_use]
    pub fn numbered(index: u32, failure_rate: f64) -> Self {
        let id = AirlineId::new(format!("sim-airline-{index}"))
            .expect("generated airline ID is valid");
        let base = 1_000 + u64::from(index) * 500;
        Self::new(SimulatedSettings {
            id,
            name: format!("SimAirline{index}"),
            failure_rate,
            response_time_ms: [base, base + 2_000],
        })
    }

    fn simulated_failure(kind: u32) -> ScrapeError {
        match kind {
            0 => ScrapeError::Navigation("simulated network timeout".to_string()),
            1 => ScrapeError::Timeout("simulated results page load".to_string()),
            2 => ScrapeError::Extraction("simulated malformed results page".to_string()),
            _ => ScrapeError::AntiAutomation("simulated anti-bot challenge".to_string()),
        }
    }

    fn segments(origin: &AirportCode, destination: &AirportCode, prefix: &str) -> Vec<FlightSegment> {
        let flight_number = {
            let mut rng = rand::thread_rng();
            format!("{prefix}{}", rng.gen_range(1_000..10_000))
        };
        let aircraft = {
            let mut rng = rand::thread_rng();
            AIRCRAFT[rng.gen_range(0..AIRCRAFT.len())].to_string()
        };
        vec![FlightSegment {
            flight_number,
            origin: origin.clone(),
            destination: destination.clone(),
            aircraft: Some(aircraft),
        }]
    }
}

#[async_trait::async_trait]
impl<P: Send + Sync> AirlineScraper<P> for SimulatedScraper {
    fn id(&self) -> &AirlineId {
        &self.settings.id
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn search(&self, params: &SearchParams, _page: &P) -> Result<Vec<FlightResult>> {
        // Draw everything up front: ThreadRng cannot be held across awaits.
        let (delay_ms, failure, has_results, result_count, base_points, taxes, stops) = {
            let mut rng = rand::thread_rng();
            let [min, max] = self.settings.response_time_ms;
            (
                rng.gen_range(min..=max),
                rng.gen_bool(self.settings.failure_rate)
                    .then(|| rng.gen_range(0..4u32)),
                rng.gen_bool(0.7),
                rng.gen_range(1..=3u64),
                rng.gen_range(25_000..=105_000u64),
                f64::from(rng.gen_range(50..=350u32)),
                if rng.gen_bool(0.6) { 0 } else { rng.gen_range(1..=2u32) },
            )
        };

        debug!(
            airline = %self.settings.name,
            origin = %params.origin,
            destination = %params.destination,
            "simulating search ({delay_ms}ms)"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if let Some(kind) = failure {
            return Err(Self::simulated_failure(kind));
        }
        if !has_results {
            return Ok(vec![]);
        }

        let prefix: String = self
            .settings
            .name
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase();

        let mut results = Vec::new();
        for i in 0..result_count {
            let points = base_points + i * 5_000;
            results.push(FlightResult {
                airline: self.settings.name.clone(),
                outbound_date: params.outbound_date,
                return_date: params.return_date,
                price: PriceQuote::from_points(points, Some(taxes)),
                outbound_segments: Self::segments(&params.origin, &params.destination, &prefix),
                return_segments: params
                    .return_date
                    .map(|_| Self::segments(&params.destination, &params.origin, &prefix))
                    .unwrap_or_default(),
                duration: None,
                stops,
                aircraft: None,
                booking_class: "Economy".to_string(),
                availability: Availability::Available,
            });
        }

        sort_cheapest_first(&mut results);
        debug!(airline = %self.settings.name, count = results.len(), "simulated results ready");
        Ok(results)
    }
}
