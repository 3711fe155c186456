use awardgrid_airline::ScrapeError;
use awardgrid_browser::PoolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

/// Failure of one task attempt, folding both ways an attempt can go wrong:
/// getting a page, or using it.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_folding() {
        let err: SearchError = PoolError::ShuttingDown.into();
        assert!(matches!(err, SearchError::Pool(_)));

        let err: SearchError = ScrapeError::Timeout("results".to_string()).into();
        assert!(matches!(err, SearchError::Scrape(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
