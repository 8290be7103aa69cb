use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Direction of a punch as reported by the clock hardware. Many devices
/// report only a numeric event code, some report nothing usable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PunchKind {
    In,
    Out,
    Unknown,
}

impl PunchKind {
    /// Normalize the raw device event code. eTimeTrack mirrors use `0`/`1`,
    /// newer firmware writes `IN`/`OUT`, everything else is unknown.
    pub fn from_device_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("IN") | Some("in") | Some("0") => PunchKind::In,
            Some("OUT") | Some("out") | Some("1") => PunchKind::Out,
            _ => PunchKind::Unknown,
        }
    }
}

/// One physical clock-in/out observation, normalized to UTC by the adapter.
///
/// Identity is `(employee_ref, timestamp)` to the second: the same punch
/// mirrored through two tables differs only in `source_id` and payload trivia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchEvent {
    pub source_id: String,
    pub employee_ref: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PunchKind,
}

impl PunchEvent {
    /// Composite key under which duplicates across sources collapse.
    pub fn identity_key(&self) -> (String, i64) {
        (self.employee_ref.clone(), self.timestamp.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_codes_normalize() {
        assert_eq!(PunchKind::from_device_code(Some("0")), PunchKind::In);
        assert_eq!(PunchKind::from_device_code(Some("1")), PunchKind::Out);
        assert_eq!(PunchKind::from_device_code(Some("IN")), PunchKind::In);
        assert_eq!(PunchKind::from_device_code(Some("out")), PunchKind::Out);
        assert_eq!(PunchKind::from_device_code(Some("7")), PunchKind::Unknown);
        assert_eq!(PunchKind::from_device_code(None), PunchKind::Unknown);
    }
}
