use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::model::shift::{Shift, ShiftWindow};
use crate::sync::{local_to_utc, utc_to_local};

/// Work-day boundary for employees with no shift assignment: punches before
/// 05:00 local belong to the previous day's shift.
const DEFAULT_CUTOFF_HOUR: u32 = 5;

/// Anchor a wall-clock shift to one calendar day.
///
/// Employees without a shift get no window; lateness and early departure are
/// then undefined and metrics fall back to presence-only classification.
pub fn resolve(shift: Option<&Shift>, date: NaiveDate, tz_offset_minutes: i32) -> Option<ShiftWindow> {
    let shift = shift?;

    let start_local = date.and_time(shift.start_time);
    let mut end_local = date.and_time(shift.end_time);
    if shift.crosses_midnight() {
        end_local += Duration::days(1);
    }

    let start = local_to_utc(start_local, tz_offset_minutes);
    let end = local_to_utc(end_local, tz_offset_minutes);

    Some(ShiftWindow {
        start,
        end,
        allowed_in: start + Duration::minutes(shift.grace_in_minutes),
        allowed_out: end - Duration::minutes(shift.grace_out_minutes),
    })
}

/// Local hour before which a punch counts toward the previous work day.
///
/// Day shifts: anything more than four hours before the start is the tail of
/// yesterday's work. Night shifts reach further back, since the shift itself
/// runs past midnight.
pub fn logical_cutoff_hour(shift: Option<&Shift>) -> u32 {
    match shift {
        Some(s) => {
            let start_hour = s.start_time.hour();
            if start_hour < 12 {
                start_hour.saturating_sub(4)
            } else {
                start_hour.saturating_sub(6)
            }
        }
        None => DEFAULT_CUTOFF_HOUR,
    }
}

/// The work day a punch belongs to, in site-local terms.
pub fn logical_date(instant: DateTime<Utc>, tz_offset_minutes: i32, cutoff_hour: u32) -> NaiveDate {
    let local = utc_to_local(instant, tz_offset_minutes);
    if local.hour() < cutoff_hour {
        local.date() - Duration::days(1)
    } else {
        local.date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn shift(start: (u32, u32), end: (u32, u32), grace_in: i64, grace_out: i64) -> Shift {
        Shift {
            id: 1,
            tenant_id: 1,
            name: "test".to_string(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            grace_in_minutes: grace_in,
            grace_out_minutes: grace_out,
            is_overnight: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_shift_window_with_grace() {
        let s = shift((9, 0), (18, 0), 15, 15);
        let w = resolve(Some(&s), date(2024, 3, 1), 0).unwrap();

        assert_eq!(w.start.naive_utc(), date(2024, 3, 1).and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(w.end.naive_utc(), date(2024, 3, 1).and_hms_opt(18, 0, 0).unwrap());
        assert_eq!(w.allowed_in.naive_utc(), date(2024, 3, 1).and_hms_opt(9, 15, 0).unwrap());
        assert_eq!(w.allowed_out.naive_utc(), date(2024, 3, 1).and_hms_opt(17, 45, 0).unwrap());
    }

    #[test]
    fn overnight_end_advances_one_day() {
        let s = shift((22, 0), (6, 0), 0, 0);
        let w = resolve(Some(&s), date(2024, 3, 1), 0).unwrap();

        assert_eq!(w.start.naive_utc(), date(2024, 3, 1).and_hms_opt(22, 0, 0).unwrap());
        assert_eq!(w.end.naive_utc(), date(2024, 3, 2).and_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn explicit_overnight_flag_is_honored() {
        let mut s = shift((22, 0), (23, 0), 0, 0);
        s.is_overnight = true;
        let w = resolve(Some(&s), date(2024, 3, 1), 0).unwrap();
        assert_eq!(w.end.naive_utc(), date(2024, 3, 2).and_hms_opt(23, 0, 0).unwrap());
    }

    #[test]
    fn window_respects_site_offset() {
        let s = shift((9, 0), (18, 0), 0, 0);
        // IST: 09:00 local is 03:30 UTC.
        let w = resolve(Some(&s), date(2024, 3, 1), 330).unwrap();
        assert_eq!(w.start.naive_utc(), date(2024, 3, 1).and_hms_opt(3, 30, 0).unwrap());
    }

    #[test]
    fn no_shift_means_no_window() {
        assert!(resolve(None, date(2024, 3, 1), 0).is_none());
    }

    #[test]
    fn cutoff_tracks_shift_start() {
        assert_eq!(logical_cutoff_hour(Some(&shift((9, 0), (18, 0), 0, 0))), 5);
        assert_eq!(logical_cutoff_hour(Some(&shift((7, 0), (15, 0), 0, 0))), 3);
        assert_eq!(logical_cutoff_hour(Some(&shift((22, 0), (6, 0), 0, 0))), 16);
        assert_eq!(logical_cutoff_hour(None), 5);
    }

    #[test]
    fn early_morning_punch_belongs_to_previous_day() {
        // 02:30 local with the default cutoff: previous work day.
        let instant = local_to_utc(date(2024, 3, 2).and_hms_opt(2, 30, 0).unwrap(), 0);
        assert_eq!(logical_date(instant, 0, 5), date(2024, 3, 1));

        // 05:40 local under a night-shift cutoff of 16: still the shift
        // that started the evening before.
        let instant = local_to_utc(date(2024, 3, 2).and_hms_opt(5, 40, 0).unwrap(), 0);
        assert_eq!(logical_date(instant, 0, 16), date(2024, 3, 1));

        // Same punch with the default cutoff stays on its own calendar day.
        assert_eq!(logical_date(instant, 0, 5), date(2024, 3, 2));
    }
}
