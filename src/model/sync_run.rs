use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Audit row appended after every reconciliation run, success or not.
///
/// `source_cutoff` is the watermark the next incremental run uses as its
/// lower bound. It is this run's start instant rather than the newest event
/// seen: anything mirrored while the run was executing carries a later
/// timestamp and is picked up next time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub tenant_id: u64,
    pub started_at: DateTime<Utc>,
    pub source_cutoff: DateTime<Utc>,
    pub records_processed: u32,
    pub status: RunStatus,
    pub message: String,
}

/// Caller-facing result of one run. Administrative recalculation surfaces
/// these counts directly; partial failures never raise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Employees fully processed.
    pub processed: u32,
    /// Attendance rows inserted for the first time.
    pub created: u32,
    /// Attendance rows overwritten in place.
    pub updated: u32,
    /// Employees that errored plus records that failed to persist.
    pub failed: u32,
}
