use gridscout_db::DbError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Conditions that end a whole job.
///
/// Per-point fetch failures and storage write failures never surface here;
/// they are logged and the job carries on.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),

    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("could not create job record: {0}")]
    JobSetup(#[source] DbError),

    #[error("provider quota exceeded")]
    QuotaExceeded,

    #[error("cost limit exceeded: {cost} > {ceiling}")]
    CostLimitExceeded { cost: Decimal, ceiling: Decimal },

    #[error("job aborted: {0}")]
    Aborted(String),
}
