use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock shift definition assigned to an employee. Times carry no date;
/// the resolver anchors them to a concrete calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shift {
    pub id: u64,
    pub tenant_id: u64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_in_minutes: i64,
    pub grace_out_minutes: i64,
    pub is_overnight: bool,
}

impl Shift {
    /// An overnight shift is flagged explicitly, or inferred when the end
    /// wall-clock time precedes the start.
    pub fn crosses_midnight(&self) -> bool {
        self.is_overnight || self.end_time < self.start_time
    }
}

/// A shift anchored to one calendar day, in UTC instants.
/// `allowed_in`/`allowed_out` already include the grace tolerances; no other
/// rounding or snapping is ever applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub allowed_in: DateTime<Utc>,
    pub allowed_out: DateTime<Utc>,
}
