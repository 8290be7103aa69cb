pub mod dedup;
pub mod metrics;
pub mod reconcile;
pub mod shift;
pub mod source;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Clock hardware stamps punches in site-local wall time; everything past
/// the adapter runs on UTC. These two are the only conversion points.
pub fn local_to_utc(local: NaiveDateTime, tz_offset_minutes: i32) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(
        local - Duration::minutes(tz_offset_minutes as i64),
        Utc,
    )
}

pub fn utc_to_local(instant: DateTime<Utc>, tz_offset_minutes: i32) -> NaiveDateTime {
    instant.naive_utc() + Duration::minutes(tz_offset_minutes as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn local_utc_round_trip() {
        let local = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let utc = local_to_utc(local, 330);
        assert_eq!(utc.naive_utc().format("%H:%M").to_string(), "04:00");
        assert_eq!(utc_to_local(utc, 330), local);
    }
}
