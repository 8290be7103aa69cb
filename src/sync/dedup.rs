use std::collections::HashSet;

use crate::model::punch::PunchEvent;

/// Collapse events that describe the same physical punch arriving through
/// more than one source. Identity is `(employee_ref, timestamp)` to the
/// second; the first-seen record wins, which is deterministic because the
/// coordinator queries the live mirror before any archival table. Payload
/// fields outside the key (device label, source id) may differ trivially and
/// are ignored.
pub fn dedupe(events: Vec<PunchEvent>) -> Vec<PunchEvent> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut unique = Vec::with_capacity(events.len());

    for event in events {
        if seen.insert(event.identity_key()) {
            unique.push(event);
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::punch::PunchKind;
    use chrono::{TimeZone, Utc};

    fn punch(source: &str, employee_ref: &str, secs: i64) -> PunchEvent {
        PunchEvent {
            source_id: source.to_string(),
            employee_ref: employee_ref.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            kind: PunchKind::Unknown,
        }
    }

    #[test]
    fn same_key_via_two_sources_collapses_to_one() {
        let events = vec![
            punch("live_mirror", "101", 0),
            punch("archive_2024", "101", 0),
            punch("live_mirror", "101", 60),
        ];

        let unique = dedupe(events);

        assert_eq!(unique.len(), 2);
        assert_eq!(
            unique.iter().filter(|e| e.timestamp.timestamp() == 1_700_000_000).count(),
            1
        );
    }

    #[test]
    fn first_seen_record_wins() {
        let unique = dedupe(vec![
            punch("live_mirror", "101", 0),
            punch("archive_2024", "101", 0),
        ]);

        assert_eq!(unique[0].source_id, "live_mirror");
    }

    #[test]
    fn same_timestamp_different_employees_are_distinct() {
        let unique = dedupe(vec![punch("live_mirror", "101", 0), punch("live_mirror", "102", 0)]);
        assert_eq!(unique.len(), 2);
    }
}
