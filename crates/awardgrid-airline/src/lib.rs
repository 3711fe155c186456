//! Airline search producers for Awardgrid.
//!
//! Everything site-specific lives here: the `AirlineScraper` capability the
//! orchestrator fans out over, TOML-loadable airline definitions, the
//! British Airways producer, a simulated producer for demos and tests, and
//! the flight-result model producers emit.

pub mod british_airways;
pub mod definition;
pub mod error;
pub mod result;
pub mod scraper;
pub mod simulated;
pub mod standardize;

pub use british_airways::BritishAirwaysScraper;
pub use definition::{load_definitions, AirlineDefinition};
pub use error::{DefinitionError, Result, ScrapeError};
pub use result::{sort_cheapest_first, Availability, FlightResult, FlightSegment, PriceQuote};
pub use scraper::AirlineScraper;
pub use simulated::{SimulatedScraper, SimulatedSettings};
