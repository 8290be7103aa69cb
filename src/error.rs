use chrono::NaiveDate;
use thiserror::Error;

/// Engine error taxonomy. Only `InvalidDateRange` and a totally unreachable
/// store abort a run; everything else is caught, counted and logged at the
/// layer that owns the retry/skip decision.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// A configured punch source could not be reached or queried. Archival
    /// partitions legitimately come and go, so the run continues without it.
    #[error("punch source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A punch references a device user no employee is enrolled under.
    #[error("no employee matches device ref {0}")]
    UnknownEmployeeRef(String),

    /// Per-employee computation failed; the run continues with the rest.
    #[error("employee {employee_id}: {reason}")]
    Compute { employee_id: u64, reason: String },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("persistence error: {0}")]
    Persistence(String),
}
