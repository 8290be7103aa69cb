use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::model::punch::PunchEvent;

/// Day classification. Stored as display strings so reports read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    #[strum(serialize = "Half Day")]
    HalfDay,
}

/// Reconciliation output for one employee on one calendar day.
///
/// Keyed uniquely by `(employee_id, date)`; re-running reconciliation over
/// the same punch history overwrites this row in place, never duplicates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub tenant_id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub first_in: Option<DateTime<Utc>>,
    pub last_out: Option<DateTime<Utc>>,
    /// Elapsed first-in to last-out, hours. Overcounts breaks.
    pub total_span_hours: f64,
    /// Sum of paired IN→OUT intervals, hours. Undercounts unpaired punches.
    /// Payroll consumes both figures for different rules, so both persist.
    pub worked_hours: f64,
    pub late_minutes: i64,
    pub early_departure_minutes: i64,
    pub punch_count: u32,
    pub status: AttendanceStatus,
    /// Ordered snapshot of the punches this record was derived from, kept
    /// for audit and explainability. Downstream consumers display it only.
    pub raw_punches: Vec<PunchEvent>,
}
