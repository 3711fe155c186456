//! Airline definition types and loading.
//!
//! A definition captures everything site-specific about one airline's award
//! search — URLs, timing, selector alternatives, extraction patterns — so
//! scraper code stays generic over it. Definitions load from TOML files,
//! with a built-in British Airways definition as the default.

use crate::error::DefinitionError;
use awardgrid_core::AirlineId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Complete definition of one airline's award search flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlineDefinition {
    /// Core airline metadata
    pub airline: AirlineMetadata,
    /// Timeout table
    pub timeouts: TimeoutTable,
    /// Retry table (consumed by the executor configuration)
    pub retries: RetryTable,
    /// Human-pacing delay ranges
    pub pacing: PacingTable,
    /// Selector alternatives per purpose; first match wins
    pub selectors: SelectorSet,
    /// Data extraction patterns
    pub patterns: ExtractionPatterns,
    /// User agents rotated between searches
    pub user_agents: Vec<String>,
}

/// Core airline metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlineMetadata {
    /// Unique airline identifier (e.g., "british-airways")
    pub id: AirlineId,
    /// Human-readable airline name
    pub name: String,
    /// Award search entry URL
    pub search_url: String,
    /// Date format the search form accepts (chrono syntax)
    pub date_format: String,
}

/// Per-phase timeouts in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutTable {
    pub navigation_ms: u64,
    pub element_wait_ms: u64,
    pub results_ms: u64,
}

/// Retry behavior for this airline's searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryTable {
    pub max_attempts: u32,
    pub backoff_delay_ms: u64,
}

/// Delay ranges that make form interaction look human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PacingTable {
    /// [min, max] pause between form actions
    pub between_actions_ms: [u64; 2],
    /// [min, max] pause between typed characters
    pub typing_ms: [u64; 2],
    /// [min, max] pause after clicking
    pub after_click_ms: [u64; 2],
    /// Fixed pause for the page to stabilize after load
    pub page_stabilization_ms: u64,
    /// Minimum interval between two searches on this airline
    pub min_request_interval_ms: u64,
}

/// Selector alternatives organized by purpose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub cookie_accept: Vec<String>,
    pub popup_close: Vec<String>,
    pub origin: Vec<String>,
    pub destination: Vec<String>,
    pub departure_date: Vec<String>,
    pub return_date: Vec<String>,
    pub cabin_class: Vec<String>,
    pub search_button: Vec<String>,
    pub result_card: Vec<String>,
    pub no_results: Vec<String>,
    pub error: Vec<String>,
}

/// Regex patterns for extracting data from result text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPatterns {
    /// Captures the points amount, e.g. `26,750 Avios`
    pub points: String,
    /// Captures the cash taxes amount, e.g. `+ £345.67`
    pub taxes: String,
}

impl ExtractionPatterns {
    /// Compile the points pattern.
    pub fn points_regex(&self) -> Result<Regex, DefinitionError> {
        compile(&self.points, "patterns.points")
    }

    /// Compile the taxes pattern.
    pub fn taxes_regex(&self) -> Result<Regex, DefinitionError> {
        compile(&self.taxes, "patterns.taxes")
    }
}

fn compile(pattern: &str, field: &str) -> Result<Regex, DefinitionError> {
    Regex::new(pattern).map_err(|e| DefinitionError::Invalid {
        airline: String::new(),
        reason: format!("{field} does not compile: {e}"),
    })
}

impl AirlineDefinition {
    /// Parse and validate a definition from TOML text.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, DefinitionError> {
        let definition: Self = toml::from_str(toml_str)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let invalid = |reason: String| DefinitionError::Invalid {
            airline: self.airline.id.to_string(),
            reason,
        };

        if self.airline.name.is_empty() {
            return Err(invalid("airline name cannot be empty".to_string()));
        }
        if !self.airline.search_url.starts_with("http") {
            return Err(invalid(format!(
                "search_url must be an http(s) URL, got '{}'",
                self.airline.search_url
            )));
        }

        for (field, list) in [
            ("selectors.origin", &self.selectors.origin),
            ("selectors.destination", &self.selectors.destination),
            ("selectors.search_button", &self.selectors.search_button),
            ("selectors.result_card", &self.selectors.result_card),
        ] {
            if list.is_empty() {
                return Err(invalid(format!("{field} must list at least one selector")));
            }
        }

        if self.retries.max_attempts == 0 {
            return Err(invalid("retries.max_attempts must be at least 1".to_string()));
        }
        if self.timeouts.navigation_ms == 0 || self.timeouts.results_ms == 0 {
            return Err(invalid("timeouts must be non-zero".to_string()));
        }

        for (field, range) in [
            ("pacing.between_actions_ms", self.pacing.between_actions_ms),
            ("pacing.typing_ms", self.pacing.typing_ms),
            ("pacing.after_click_ms", self.pacing.after_click_ms),
        ] {
            if range[0] > range[1] {
                return Err(invalid(format!("{field} range is inverted")));
            }
        }

        if self.user_agents.is_empty() {
            return Err(invalid("user_agents must list at least one entry".to_string()));
        }

        // chrono surfaces bad format strings only at render time; probe now
        // so scrapers can format dates infallibly later.
        let probe = chrono::NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid probe date");
        let mut rendered = String::new();
        if write!(rendered, "{}", probe.format(&self.airline.date_format)).is_err() {
            return Err(invalid(format!(
                "date_format '{}' is not a valid chrono format",
                self.airline.date_format
            )));
        }

        self.patterns.points_regex().map_err(|e| invalid(e.to_string()))?;
        self.patterns.taxes_regex().map_err(|e| invalid(e.to_string()))?;

        Ok(())
    }

    /// Built-in British Airways award search definition.
    #[must_use]
    pub fn british_airways() -> Self {
        Self {
            airline: AirlineMetadata {
                id: AirlineId::new("british-airways").expect("valid builtin airline ID"),
                name: "British Airways".to_string(),
                search_url: "https://www.britishairways.com/travel/redeem/execclub/_gf/en_gb"
                    .to_string(),
                date_format: "%d/%m/%Y".to_string(),
            },
            timeouts: TimeoutTable {
                navigation_ms: 45_000,
                element_wait_ms: 10_000,
                results_ms: 30_000,
            },
            retries: RetryTable {
                max_attempts: 3,
                backoff_delay_ms: 2_000,
            },
            pacing: PacingTable {
                between_actions_ms: [500, 1_500],
                typing_ms: [50, 150],
                after_click_ms: [1_000, 2_000],
                page_stabilization_ms: 2_000,
                min_request_interval_ms: 2_000,
            },
            selectors: SelectorSet {
                cookie_accept: vec![
                    "#ensCloseBanner".to_string(),
                    ".cmp-button_button".to_string(),
                    "[data-module=\"cookie-banner\"] button".to_string(),
                    "button[aria-label*=\"Accept\"]".to_string(),
                    ".cookie-accept".to_string(),
                ],
                popup_close: vec![
                    "[data-testid=\"modal-close\"]".to_string(),
                    ".modal-close".to_string(),
                    ".popup-close".to_string(),
                    "button[aria-label*=\"close\"]".to_string(),
                    ".close-button".to_string(),
                ],
                origin: vec![
                    "#oneWayFlightSearchOriginStationInput".to_string(),
                    "input[name=\"origin\"]".to_string(),
                    "#departurePoint".to_string(),
                    ".departure input".to_string(),
                ],
                destination: vec![
                    "#oneWayFlightSearchDestinationStationInput".to_string(),
                    "input[name=\"destination\"]".to_string(),
                    "#arrivalPoint".to_string(),
                    ".arrival input".to_string(),
                ],
                departure_date: vec![
                    "#oneWayFlightSearchOutboundDateInput".to_string(),
                    "input[name=\"departureDate\"]".to_string(),
                    "#departureDate".to_string(),
                ],
                return_date: vec![
                    "#returnFlightSearchInboundDateInput".to_string(),
                    "input[name=\"returnDate\"]".to_string(),
                    "#returnDate".to_string(),
                ],
                cabin_class: vec![
                    "#oneWayFlightSearchCabinClassInput".to_string(),
                    "select[name=\"cabinClass\"]".to_string(),
                    "#cabinClass".to_string(),
                ],
                search_button: vec![
                    "#flightSearchSubmitBtn".to_string(),
                    "button[type=\"submit\"]".to_string(),
                    ".search-button".to_string(),
                    ".flight-search-submit".to_string(),
                ],
                result_card: vec![
                    ".flight-results .flight-item".to_string(),
                    ".flight-option".to_string(),
                    ".flight-card".to_string(),
                    ".flight-result".to_string(),
                ],
                no_results: vec![
                    ".no-flights".to_string(),
                    ".no-results".to_string(),
                    ".empty-results".to_string(),
                    ".no-availability".to_string(),
                ],
                error: vec![
                    ".error-message".to_string(),
                    ".alert-error".to_string(),
                    ".validation-error".to_string(),
                    ".system-error".to_string(),
                ],
            },
            patterns: ExtractionPatterns {
                points: r"(?i)(\d+(?:,\d+)?)\s*(?:avios|points?)".to_string(),
                taxes: r"\+?\s*[£$€](\d+(?:\.\d{2})?)".to_string(),
            },
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            ],
        }
    }
}

/// Load all `*.toml` definitions from a directory.
///
/// Files that fail to parse or validate abort the load; a missing directory
/// is an error, an empty one yields an empty vector.
pub fn load_definitions(dir: &Path) -> Result<Vec<AirlineDefinition>, DefinitionError> {
    let mut definitions = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        debug!("loading airline definition from {}", path.display());
        let contents = std::fs::read_to_string(&path)?;
        definitions.push(AirlineDefinition::from_toml_str(&contents)?);
    }

    info!(count = definitions.len(), "loaded airline definitions");
    Ok(definitions)
}
