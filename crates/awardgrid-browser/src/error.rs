use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors surfaced by the page pool.
///
/// Waiting for capacity is not an error; `Exhausted` means an allocation
/// itself failed (browser launch, page open).
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("browser pool exhausted: {0}")]
    Exhausted(String),

    #[error("browser pool is shutting down")]
    ShuttingDown,
}
