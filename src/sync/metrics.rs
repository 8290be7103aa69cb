use chrono::{DateTime, Utc};

use crate::model::attendance::AttendanceStatus;
use crate::model::punch::{PunchEvent, PunchKind};
use crate::model::shift::ShiftWindow;

/// Days spanning less than this many hours first-in to last-out classify as
/// Half Day.
const HALF_DAY_SPAN_HOURS: f64 = 4.0;

/// Derived figures for one employee on one work day. The coordinator wraps
/// this into an `AttendanceRecord` together with the identity key and the
/// punch snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DayMetrics {
    pub first_in: Option<DateTime<Utc>>,
    pub last_out: Option<DateTime<Utc>>,
    pub total_span_hours: f64,
    pub worked_hours: f64,
    pub late_minutes: i64,
    pub early_departure_minutes: i64,
    pub punch_count: u32,
    pub status: AttendanceStatus,
}

/// Compute one day's metrics from deduplicated punches sorted ascending by
/// timestamp.
///
/// Classification precedence is fixed and order-significant: absence, then
/// lateness, then half-day span, with Present as the fallback. Hours are
/// rounded to two decimals here and nowhere earlier.
pub fn compute_day(
    punches: &[PunchEvent],
    window: Option<&ShiftWindow>,
    late_threshold_minutes: i64,
) -> DayMetrics {
    // Hardware that never reports direction still yields usable bounds: the
    // earliest/latest punch overall stand in for a missing IN/OUT.
    let first_in = punches
        .iter()
        .filter(|p| p.kind == PunchKind::In)
        .map(|p| p.timestamp)
        .min()
        .or_else(|| punches.first().map(|p| p.timestamp));

    let last_out = punches
        .iter()
        .filter(|p| p.kind == PunchKind::Out)
        .map(|p| p.timestamp)
        .max()
        .or_else(|| punches.last().map(|p| p.timestamp));

    let total_span_hours = match (first_in, last_out) {
        (Some(fi), Some(lo)) if lo > fi => (lo - fi).num_seconds() as f64 / 3600.0,
        _ => 0.0,
    };

    let worked_hours = paired_hours(punches);

    let (late_minutes, early_departure_minutes) = match window {
        Some(w) => {
            let late = first_in
                .map(|fi| (fi - w.allowed_in).num_minutes().max(0))
                .unwrap_or(0);
            let early = last_out
                .map(|lo| (w.allowed_out - lo).num_minutes().max(0))
                .unwrap_or(0);
            (late, early)
        }
        None => (0, 0),
    };

    let status = if first_in.is_none() {
        AttendanceStatus::Absent
    } else if late_minutes > late_threshold_minutes {
        AttendanceStatus::Late
    } else if total_span_hours < HALF_DAY_SPAN_HOURS {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::Present
    };

    DayMetrics {
        first_in,
        last_out,
        total_span_hours: round2(total_span_hours),
        worked_hours: round2(worked_hours),
        late_minutes,
        early_departure_minutes,
        punch_count: punches.len() as u32,
        status,
    }
}

/// Sum of maximal chronological IN→OUT intervals. An IN with no later OUT
/// contributes nothing; an OUT with no open IN is ignored; UNKNOWN punches
/// never participate in pairing.
fn paired_hours(punches: &[PunchEvent]) -> f64 {
    let mut total_seconds = 0i64;
    let mut open_in: Option<DateTime<Utc>> = None;

    for punch in punches {
        match punch.kind {
            PunchKind::In => {
                if open_in.is_none() {
                    open_in = Some(punch.timestamp);
                }
            }
            PunchKind::Out => {
                if let Some(started) = open_in.take() {
                    total_seconds += (punch.timestamp - started).num_seconds().max(0);
                }
            }
            PunchKind::Unknown => {}
        }
    }

    total_seconds as f64 / 3600.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::shift::resolve;
    use crate::model::shift::Shift;
    use chrono::{NaiveDate, NaiveTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(date.and_hms_opt(h, m, 0).unwrap(), Utc)
    }

    fn punch(ts: DateTime<Utc>, kind: PunchKind) -> PunchEvent {
        PunchEvent {
            source_id: "live_mirror".to_string(),
            employee_ref: "101".to_string(),
            timestamp: ts,
            kind,
        }
    }

    fn day_shift(grace_in: i64, grace_out: i64) -> Shift {
        Shift {
            id: 1,
            tenant_id: 1,
            name: "general".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            grace_in_minutes: grace_in,
            grace_out_minutes: grace_out,
            is_overnight: false,
        }
    }

    #[test]
    fn no_punches_is_absent() {
        let m = compute_day(&[], None, 30);
        assert_eq!(m.status, AttendanceStatus::Absent);
        assert_eq!(m.first_in, None);
        assert_eq!(m.last_out, None);
        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.total_span_hours, 0.0);
        assert_eq!(m.punch_count, 0);
    }

    #[test]
    fn lone_in_is_not_absent() {
        let ts = at(day(), 9, 0);
        let m = compute_day(&[punch(ts, PunchKind::In)], None, 30);

        assert_eq!(m.first_in, Some(ts));
        // Fallback: latest punch overall doubles as last-out.
        assert_eq!(m.last_out, Some(ts));
        assert_eq!(m.total_span_hours, 0.0);
        assert_eq!(m.worked_hours, 0.0);
        assert_ne!(m.status, AttendanceStatus::Absent);
    }

    #[test]
    fn unknown_kinds_fall_back_to_extremes() {
        let punches = vec![
            punch(at(day(), 9, 5), PunchKind::Unknown),
            punch(at(day(), 13, 0), PunchKind::Unknown),
            punch(at(day(), 18, 10), PunchKind::Unknown),
        ];
        let m = compute_day(&punches, None, 30);

        assert_eq!(m.first_in, Some(at(day(), 9, 5)));
        assert_eq!(m.last_out, Some(at(day(), 18, 10)));
        assert!(m.total_span_hours > 9.0);
        // Direction is unknown, so no interval can be credited as worked.
        assert_eq!(m.worked_hours, 0.0);
    }

    #[test]
    fn within_grace_scenario() {
        // 09:00-18:00, grace 15/15, punches 09:10 IN / 18:05 OUT.
        let shift = day_shift(15, 15);
        let w = resolve(Some(&shift), day(), 0).unwrap();
        let punches = vec![
            punch(at(day(), 9, 10), PunchKind::In),
            punch(at(day(), 18, 5), PunchKind::Out),
        ];

        let m = compute_day(&punches, Some(&w), 30);

        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.early_departure_minutes, 0);
        assert_eq!(m.worked_hours, 8.92);
        assert_eq!(m.status, AttendanceStatus::Present);
    }

    #[test]
    fn late_but_under_threshold_stays_present() {
        // 09:40 IN is 25 min past allowed-in (09:15): below the 30-minute
        // threshold, and the span is well over four hours, so Present.
        let shift = day_shift(15, 15);
        let w = resolve(Some(&shift), day(), 0).unwrap();
        let punches = vec![
            punch(at(day(), 9, 40), PunchKind::In),
            punch(at(day(), 17, 0), PunchKind::Out),
        ];

        let m = compute_day(&punches, Some(&w), 30);

        assert_eq!(m.late_minutes, 25);
        assert_eq!(m.early_departure_minutes, 45);
        assert_eq!(m.status, AttendanceStatus::Present);
    }

    #[test]
    fn lateness_minute_boundaries() {
        let shift = day_shift(0, 0);
        let w = resolve(Some(&shift), day(), 0).unwrap();

        // Exactly at allowed-in: zero.
        let m = compute_day(
            &[punch(at(day(), 9, 0), PunchKind::In), punch(at(day(), 18, 0), PunchKind::Out)],
            Some(&w),
            30,
        );
        assert_eq!(m.late_minutes, 0);

        // One minute past: one.
        let m = compute_day(
            &[punch(at(day(), 9, 1), PunchKind::In), punch(at(day(), 18, 0), PunchKind::Out)],
            Some(&w),
            30,
        );
        assert_eq!(m.late_minutes, 1);
    }

    #[test]
    fn late_threshold_is_exclusive() {
        let shift = day_shift(0, 0);
        let w = resolve(Some(&shift), day(), 0).unwrap();

        for (minutes, expected) in [
            (29, AttendanceStatus::Present),
            (30, AttendanceStatus::Present),
            (31, AttendanceStatus::Late),
        ] {
            let m = compute_day(
                &[
                    punch(at(day(), 9, minutes), PunchKind::In),
                    punch(at(day(), 18, 0), PunchKind::Out),
                ],
                Some(&w),
                30,
            );
            assert_eq!(m.late_minutes, minutes as i64);
            assert_eq!(m.status, expected, "at {} minutes late", minutes);
        }
    }

    #[test]
    fn short_span_is_half_day() {
        let shift = day_shift(0, 0);
        let w = resolve(Some(&shift), day(), 0).unwrap();
        let punches = vec![
            punch(at(day(), 9, 0), PunchKind::In),
            punch(at(day(), 12, 30), PunchKind::Out),
        ];

        let m = compute_day(&punches, Some(&w), 30);

        assert_eq!(m.total_span_hours, 3.5);
        assert_eq!(m.status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn lateness_beats_half_day_in_precedence() {
        // 90 minutes late AND under four hours of span: Late wins, the
        // half-day check is never reached.
        let shift = day_shift(0, 0);
        let w = resolve(Some(&shift), day(), 0).unwrap();
        let punches = vec![
            punch(at(day(), 10, 30), PunchKind::In),
            punch(at(day(), 13, 0), PunchKind::Out),
        ];

        let m = compute_day(&punches, Some(&w), 30);

        assert_eq!(m.late_minutes, 90);
        assert_eq!(m.status, AttendanceStatus::Late);
    }

    #[test]
    fn unpaired_punches_do_not_accrue_worked_hours() {
        // OUT with no open IN is ignored; the trailing IN never closes.
        let punches = vec![
            punch(at(day(), 8, 0), PunchKind::Out),
            punch(at(day(), 9, 0), PunchKind::In),
            punch(at(day(), 13, 0), PunchKind::Out),
            punch(at(day(), 14, 0), PunchKind::In),
        ];

        let m = compute_day(&punches, None, 30);

        assert_eq!(m.worked_hours, 4.0);
        assert_eq!(m.total_span_hours, 6.0);
    }

    #[test]
    fn multiple_pairs_sum_and_span_overcounts_the_break() {
        let punches = vec![
            punch(at(day(), 9, 0), PunchKind::In),
            punch(at(day(), 13, 0), PunchKind::Out),
            punch(at(day(), 14, 0), PunchKind::In),
            punch(at(day(), 18, 0), PunchKind::Out),
        ];

        let m = compute_day(&punches, None, 30);

        assert_eq!(m.worked_hours, 8.0);
        assert_eq!(m.total_span_hours, 9.0);
        assert_eq!(m.punch_count, 4);
    }

    #[test]
    fn overnight_shift_has_no_spurious_lateness() {
        // 22:00-06:00 with a wide night-shift grace; in 23:50, out 05:40
        // the next morning.
        let shift = Shift {
            id: 2,
            tenant_id: 1,
            name: "night".to_string(),
            start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            grace_in_minutes: 120,
            grace_out_minutes: 30,
            is_overnight: false,
        };
        let w = resolve(Some(&shift), day(), 0).unwrap();
        let next = day().succ_opt().unwrap();
        let punches = vec![
            punch(at(day(), 23, 50), PunchKind::In),
            punch(at(next, 5, 40), PunchKind::Out),
        ];

        let m = compute_day(&punches, Some(&w), 30);

        assert_eq!(m.worked_hours, 5.83);
        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.status, AttendanceStatus::Present);
    }

    #[test]
    fn hours_round_to_two_decimals() {
        // 09:00:00 to 09:10:00 is 0.1666... hours.
        let punches = vec![
            punch(at(day(), 9, 0), PunchKind::In),
            punch(at(day(), 9, 10), PunchKind::Out),
        ];
        let m = compute_day(&punches, None, 30);
        assert_eq!(m.worked_hours, 0.17);
        assert_eq!(m.total_span_hours, 0.17);
    }
}
