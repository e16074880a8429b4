use thiserror::Error;
use webtrail_db::PoolError;
use webtrail_events::StoreError;
use webtrail_logger::{LogError, LoggerError};
use webtrail_report::CatalogError;

/// Errors raised while starting a run or recording a test.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The shared store mutex was poisoned by a panicking writer.
    #[error("event store lock poisoned")]
    StorePoisoned,
}
