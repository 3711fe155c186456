//! British Airways award search producer.
//!
//! Drives a pooled chromiumoxide page through the Executive Club award
//! search: navigate, clear overlays, fill the form with human pacing,
//! submit, and extract priced options from the result cards. Every step
//! failure surfaces as a `ScrapeError` for the executor to retry.

use crate::definition::AirlineDefinition;
use crate::error::{DefinitionError, Result, ScrapeError};
use crate::result::{sort_cheapest_first, Availability, FlightResult, PriceQuote};
use crate::scraper::AirlineScraper;
use awardgrid_core::{AirlineId, SearchParams};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Element, Page};
use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How many result cards are worth parsing per search.
const MAX_RESULT_CARDS: usize = 5;

/// Poll interval while waiting for selectors.
const SELECTOR_POLL_MS: u64 = 250;

enum ResultsState {
    Found,
    Empty,
}

pub struct BritishAirwaysScraper {
    definition: AirlineDefinition,
    points_pattern: Regex,
    taxes_pattern: Regex,
    last_request: Mutex<Option<Instant>>,
}

impl BritishAirwaysScraper {
    /// Producer over the built-in definition.
    #[must_use]
    pub fn new() -> Self {
        Self::from_definition(AirlineDefinition::british_airways())
            .expect("builtin definition is valid")
    }

    /// Producer over a custom (e.g. file-loaded) definition.
    pub fn from_definition(
        definition: AirlineDefinition,
    ) -> std::result::Result<Self, DefinitionError> {
        definition.validate()?;
        let points_pattern = definition.patterns.points_regex()?;
        let taxes_pattern = definition.patterns.taxes_regex()?;
        Ok(Self {
            definition,
            points_pattern,
            taxes_pattern,
            last_request: Mutex::new(None),
        })
    }

    /// Honor the minimum interval between two searches on this airline.
    async fn pace(&self) {
        let wait = {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            let min = Duration::from_millis(self.definition.pacing.min_request_interval_ms);
            let wait = match *last {
                Some(prev) => min.saturating_sub(now.duration_since(prev)),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            debug!(airline = %self.definition.airline.name, "pacing: waiting {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }

    async fn apply_user_agent(&self, page: &Page) -> Result<()> {
        let user_agent = {
            let mut rng = rand::thread_rng();
            let agents = &self.definition.user_agents;
            agents[rng.gen_range(0..agents.len())].clone()
        };
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .build()
            .map_err(ScrapeError::Navigation)?;
        page.set_user_agent(params)
            .await
            .map(|_| ())
            .map_err(|e| ScrapeError::Navigation(format!("set user agent: {e}")))
    }

    async fn navigate(&self, page: &Page) -> Result<()> {
        let url = &self.definition.airline.search_url;
        debug!(airline = %self.definition.airline.name, "navigating to {url}");
        let nav = async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(
            Duration::from_millis(self.definition.timeouts.navigation_ms),
            nav,
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::Navigation(e.to_string())),
            Err(_) => Err(ScrapeError::Timeout("navigation".to_string())),
        }
    }

    /// Dismiss cookie banners and popups, first matching selector per group
    /// wins. Their absence is normal and never an error.
    async fn dismiss_overlays(&self, page: &Page) {
        let selectors = &self.definition.selectors;
        for group in [&selectors.cookie_accept, &selectors.popup_close] {
            for selector in group.iter() {
                if let Ok(element) = page.find_element(selector.as_str()).await {
                    if element.click().await.is_ok() {
                        debug!("dismissed overlay via {selector}");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        break;
                    }
                }
            }
        }
    }

    /// Wait for any of the selector alternatives to appear.
    async fn wait_for_any(
        &self,
        page: &Page,
        selectors: &[String],
        timeout: Duration,
        what: &str,
    ) -> Result<Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for selector in selectors {
                if let Ok(element) = page.find_element(selector.as_str()).await {
                    return Ok(element);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Timeout(what.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(SELECTOR_POLL_MS)).await;
        }
    }

    /// Type text into the first matching input, character by character with
    /// human jitter.
    async fn type_into(
        &self,
        page: &Page,
        selectors: &[String],
        text: &str,
        what: &str,
    ) -> Result<()> {
        let element = self
            .wait_for_any(
                page,
                selectors,
                Duration::from_millis(self.definition.timeouts.element_wait_ms),
                what,
            )
            .await?;
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("focus {what}: {e}")))?;

        for ch in text.chars() {
            let delay = jitter(self.definition.pacing.typing_ms);
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| ScrapeError::Navigation(format!("type into {what}: {e}")))?;
            tokio::time::sleep(delay).await;
        }
        tokio::time::sleep(jitter(self.definition.pacing.between_actions_ms)).await;
        Ok(())
    }

    async fn fill_form(&self, page: &Page, params: &SearchParams) -> Result<()> {
        let selectors = &self.definition.selectors;
        debug!(airline = %self.definition.airline.name, "filling search form");

        self.type_into(page, &selectors.origin, params.origin.as_str(), "origin input")
            .await?;
        self.type_into(
            page,
            &selectors.destination,
            params.destination.as_str(),
            "destination input",
        )
        .await?;
        self.type_into(
            page,
            &selectors.departure_date,
            &self.format_date(params.outbound_date),
            "departure date input",
        )
        .await?;

        if let Some(return_date) = params.return_date {
            self.type_into(
                page,
                &selectors.return_date,
                &self.format_date(return_date),
                "return date input",
            )
            .await?;
        }

        // Cabin class is prefilled with Economy on the award form; poke the
        // control if present but never fail over it.
        for selector in &selectors.cabin_class {
            if let Ok(element) = page.find_element(selector.as_str()).await {
                let _ = element.click().await;
                break;
            }
        }
        Ok(())
    }

    async fn submit(&self, page: &Page) -> Result<()> {
        let button = self
            .wait_for_any(
                page,
                &self.definition.selectors.search_button,
                Duration::from_millis(self.definition.timeouts.element_wait_ms),
                "search button",
            )
            .await?;
        tokio::time::sleep(jitter(self.definition.pacing.between_actions_ms)).await;
        button
            .click()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("submit search: {e}")))?;
        tokio::time::sleep(jitter(self.definition.pacing.after_click_ms)).await;

        // The form may submit in place or navigate; give navigation a chance
        // without requiring it.
        let _ = tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await;
        Ok(())
    }

    /// Wait until the page shows result cards, an explicit empty state, or
    /// an error banner.
    async fn await_results(&self, page: &Page) -> Result<ResultsState> {
        if let Ok(html) = page.content().await {
            if detect_challenge(&html) {
                return Err(ScrapeError::AntiAutomation(
                    "challenge page after submit".to_string(),
                ));
            }
        }

        let selectors = &self.definition.selectors;
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.definition.timeouts.results_ms);
        loop {
            for selector in &selectors.error {
                if let Ok(element) = page.find_element(selector.as_str()).await {
                    let text = element
                        .inner_text()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| "unspecified error".to_string());
                    return Err(ScrapeError::Extraction(format!("site error: {text}")));
                }
            }
            for selector in &selectors.result_card {
                if page.find_element(selector.as_str()).await.is_ok() {
                    return Ok(ResultsState::Found);
                }
            }
            for selector in &selectors.no_results {
                if page.find_element(selector.as_str()).await.is_ok() {
                    return Ok(ResultsState::Empty);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Timeout("search results".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(SELECTOR_POLL_MS)).await;
        }
    }

    async fn extract_results(
        &self,
        page: &Page,
        params: &SearchParams,
    ) -> Result<Vec<FlightResult>> {
        let mut cards = Vec::new();
        for selector in &self.definition.selectors.result_card {
            if let Ok(found) = page.find_elements(selector.as_str()).await {
                if !found.is_empty() {
                    cards = found;
                    break;
                }
            }
        }

        let mut results = Vec::new();
        for card in cards.iter().take(MAX_RESULT_CARDS) {
            let text = match card.inner_text().await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    warn!("failed to read result card: {e}");
                    continue;
                }
            };
            if let Some(result) = self.parse_card(&text, params) {
                results.push(result);
            }
        }

        sort_cheapest_first(&mut results);
        debug!(
            airline = %self.definition.airline.name,
            count = results.len(),
            "extracted flight options"
        );
        Ok(results)
    }

    /// Parse one result card's text into a priced option, `None` when no
    /// points amount is present.
    fn parse_card(&self, text: &str, params: &SearchParams) -> Option<FlightResult> {
        let points = self.parse_points(text)?;
        let taxes = self.parse_taxes(text);

        Some(FlightResult {
            airline: self.definition.airline.name.clone(),
            outbound_date: params.outbound_date,
            return_date: params.return_date,
            price: PriceQuote::from_points(points, taxes),
            outbound_segments: vec![],
            return_segments: vec![],
            duration: None,
            stops: 0,
            aircraft: None,
            booking_class: "Economy".to_string(),
            availability: Availability::Available,
        })
    }

    fn parse_points(&self, text: &str) -> Option<u64> {
        self.points_pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|points| points.as_str().replace(',', "").parse().ok())
    }

    fn parse_taxes(&self, text: &str) -> Option<f64> {
        self.taxes_pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|taxes| taxes.as_str().parse().ok())
    }

    fn format_date(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        // The format string was probed during definition validation.
        let _ = write!(out, "{}", date.format(&self.definition.airline.date_format));
        out
    }
}

impl Default for BritishAirwaysScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AirlineScraper<Page> for BritishAirwaysScraper {
    fn id(&self) -> &AirlineId {
        &self.definition.airline.id
    }

    fn name(&self) -> &str {
        &self.definition.airline.name
    }

    async fn search(&self, params: &SearchParams, page: &Page) -> Result<Vec<FlightResult>> {
        debug!(
            airline = %self.definition.airline.name,
            origin = %params.origin,
            destination = %params.destination,
            outbound = %params.outbound_date,
            "starting award search"
        );

        self.pace().await;
        self.apply_user_agent(page).await?;
        self.navigate(page).await?;
        self.dismiss_overlays(page).await;
        tokio::time::sleep(Duration::from_millis(
            self.definition.pacing.page_stabilization_ms,
        ))
        .await;

        self.fill_form(page, params).await?;
        self.submit(page).await?;

        match self.await_results(page).await? {
            ResultsState::Empty => {
                debug!(airline = %self.definition.airline.name, "no availability for this date pair");
                Ok(vec![])
            }
            ResultsState::Found => self.extract_results(page, params).await,
        }
    }
}

/// A page asking for human verification instead of showing results.
fn detect_challenge(html: &str) -> bool {
    html.contains("recaptcha") || html.contains("g-recaptcha") || html.contains("captcha")
}

/// Random duration within an inclusive `[min, max]` millisecond range.
fn jitter(range: [u64; 2]) -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(range[0]..=range[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use awardgrid_core::AirportCode;

    fn scraper() -> BritishAirwaysScraper {
        BritishAirwaysScraper::new()
    }

    fn params() -> SearchParams {
        SearchParams {
            origin: AirportCode::new("LHR").expect("valid code"),
            destination: AirportCode::new("JFK").expect("valid code"),
            outbound_date: NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date"),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 7, 18).expect("valid date")),
        }
    }

    #[test]
    fn test_parse_points_with_commas() {
        let scraper = scraper();
        assert_eq!(
            scraper.parse_points("From 26,750 Avios + £345.67 per person"),
            Some(26_750)
        );
        assert_eq!(scraper.parse_points("50000 points"), Some(50_000));
        assert_eq!(scraper.parse_points("sold out"), None);
    }

    #[test]
    fn test_parse_taxes() {
        let scraper = scraper();
        assert_eq!(
            scraper.parse_taxes("26,750 Avios + £345.67"),
            Some(345.67)
        );
        assert_eq!(scraper.parse_taxes("26,750 Avios"), None);
    }

    #[test]
    fn test_parse_card_builds_result() {
        let scraper = scraper();
        let result = scraper
            .parse_card("Economy  26,750 Avios + £345.67", &params())
            .expect("card with points parses");
        assert_eq!(result.price.points, Some(26_750));
        assert_eq!(result.price.taxes, Some(345.67));
        assert_eq!(result.airline, "British Airways");

        assert!(scraper.parse_card("no availability", &params()).is_none());
    }

    #[test]
    fn test_format_date_uses_uk_layout() {
        let scraper = scraper();
        let date = NaiveDate::from_ymd_opt(2026, 7, 4).expect("valid date");
        assert_eq!(scraper.format_date(date), "04/07/2026");
    }

    #[test]
    fn test_detect_challenge() {
        assert!(detect_challenge(r#"<div class="g-recaptcha"></div>"#));
        assert!(detect_challenge(r#"<div class="captcha-container"></div>"#));
        assert!(!detect_challenge(r#"<div class="search-results"></div>"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_enforces_min_interval() {
        let scraper = scraper();
        let start = tokio::time::Instant::now();

        scraper.pace().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // The wall-clock gap between the two calls is negligible, so the
        // enforced wait is effectively the full minimum interval.
        scraper.pace().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_900));
        assert!(elapsed <= Duration::from_millis(2_000));
    }
}
