//! The producer capability the orchestrator fans out over.

use crate::error::Result;
use crate::result::FlightResult;
use awardgrid_core::{AirlineId, SearchParams};

/// One airline's search operation, polymorphic over the page type it drives.
///
/// Implementations perform exactly one search against the given page and
/// must not retry or manage the page lifecycle themselves; acquiring,
/// releasing, and retrying belong to the executor.
#[async_trait::async_trait]
pub trait AirlineScraper<P>: Send + Sync {
    /// Stable identifier of this airline.
    fn id(&self) -> &AirlineId;

    /// Display name of this airline.
    fn name(&self) -> &str;

    /// Run one search, returning priced options cheapest-first.
    ///
    /// An empty vector means the search ran but found no availability;
    /// that is not an error.
    async fn search(&self, params: &SearchParams, page: &P) -> Result<Vec<FlightResult>>;
}
