//! In-process implementations of the store seams. They back the engine's
//! tests and are handy for dry-running reconciliation logic without a
//! database; none of them persist anything.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::EngineError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::punch::PunchEvent;
use crate::model::shift::Shift;
use crate::model::sync_run::SyncRun;
use crate::store::{AttendanceStore, EmployeeDirectory, UpsertOutcome};
use crate::sync::source::{FetchWindow, PunchSource};

#[derive(Default)]
pub struct MemoryDirectory {
    pub employees: Vec<Employee>,
    pub shifts: HashMap<u64, Shift>,
    /// Shift ids whose lookup fails, for exercising per-employee error paths.
    pub failing_shifts: HashSet<u64>,
    /// When set, listing employees fails outright, as when the directory
    /// store is unreachable.
    pub fail_listing: bool,
}

#[async_trait]
impl EmployeeDirectory for MemoryDirectory {
    async fn employees_in_scope(
        &self,
        tenant_id: u64,
        ids: Option<&[u64]>,
    ) -> Result<Vec<Employee>, EngineError> {
        if self.fail_listing {
            return Err(EngineError::Persistence("directory unreachable".into()));
        }
        Ok(self
            .employees
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.is_active)
            .filter(|e| ids.is_none_or(|ids| ids.contains(&e.id)))
            .cloned()
            .collect())
    }

    async fn resolve_device_ref(
        &self,
        tenant_id: u64,
        employee_ref: &str,
    ) -> Result<Option<u64>, EngineError> {
        Ok(self
            .employees
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.matches_ref(employee_ref))
            .map(|e| e.id))
    }

    async fn shift_for(
        &self,
        _tenant_id: u64,
        shift_id: u64,
    ) -> Result<Option<Shift>, EngineError> {
        if self.failing_shifts.contains(&shift_id) {
            return Err(EngineError::Persistence(format!(
                "shift {} lookup failed",
                shift_id
            )));
        }
        Ok(self.shifts.get(&shift_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<BTreeMap<(u64, NaiveDate), AttendanceRecord>>,
    pub runs: Mutex<Vec<SyncRun>>,
    pub processed: Mutex<HashSet<(String, i64)>>,
    /// Number of upcoming upserts to reject, for exercising retry handling.
    pub upsert_failures: AtomicU32,
}

impl MemoryStore {
    pub fn record(&self, employee_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.records
            .lock()
            .expect("records lock poisoned")
            .get(&(employee_id, date))
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<(u64, NaiveDate), AttendanceRecord> {
        self.records.lock().expect("records lock poisoned").clone()
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<UpsertOutcome, EngineError> {
        let pending = self.upsert_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.upsert_failures.store(pending - 1, Ordering::SeqCst);
            return Err(EngineError::Persistence("injected upsert failure".into()));
        }

        let mut records = self.records.lock().expect("records lock poisoned");
        let key = (record.employee_id, record.date);
        let outcome = if records.contains_key(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        records.insert(key, record.clone());
        Ok(outcome)
    }

    async fn append_sync_run(&self, run: &SyncRun) -> Result<(), EngineError> {
        self.runs
            .lock()
            .expect("runs lock poisoned")
            .push(run.clone());
        Ok(())
    }

    async fn latest_watermark(
        &self,
        tenant_id: u64,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        Ok(self
            .runs
            .lock()
            .expect("runs lock poisoned")
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .next_back()
            .map(|r| r.source_cutoff))
    }

    async fn mark_processed(&self, events: &[PunchEvent]) -> Result<(), EngineError> {
        let mut processed = self.processed.lock().expect("processed lock poisoned");
        for event in events {
            processed.insert(event.identity_key());
        }
        Ok(())
    }
}

pub struct MemoryPunchSource {
    pub id: String,
    pub events: Vec<PunchEvent>,
    /// Mimics an archival partition that does not exist for the period.
    pub absent: bool,
}

impl MemoryPunchSource {
    pub fn new(id: &str, events: Vec<PunchEvent>) -> Self {
        Self {
            id: id.to_string(),
            events,
            absent: false,
        }
    }
}

#[async_trait]
impl PunchSource for MemoryPunchSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn try_fetch(
        &self,
        since: Option<DateTime<Utc>>,
        window: &FetchWindow,
    ) -> Result<Option<Vec<PunchEvent>>, EngineError> {
        if self.absent {
            return Ok(None);
        }
        Ok(Some(
            self.events
                .iter()
                .filter(|e| e.timestamp >= window.start && e.timestamp < window.end)
                .filter(|e| since.is_none_or(|s| e.timestamp > s))
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::punch::PunchKind;
    use chrono::TimeZone;

    fn event(secs: i64) -> PunchEvent {
        PunchEvent {
            source_id: "live_mirror".to_string(),
            employee_ref: "101".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            kind: PunchKind::Unknown,
        }
    }

    fn window(from_secs: i64, to_secs: i64) -> FetchWindow {
        FetchWindow {
            start: Utc.timestamp_opt(1_700_000_000 + from_secs, 0).unwrap(),
            end: Utc.timestamp_opt(1_700_000_000 + to_secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn fetch_honors_window_and_watermark() {
        let source = MemoryPunchSource::new("live_mirror", vec![event(0), event(100), event(200)]);

        let all = source.try_fetch(None, &window(0, 300)).await.unwrap().unwrap();
        assert_eq!(all.len(), 3);

        let bounded = source.try_fetch(None, &window(50, 200)).await.unwrap().unwrap();
        assert_eq!(bounded.len(), 1);

        let since = source
            .try_fetch(Some(Utc.timestamp_opt(1_700_000_100, 0).unwrap()), &window(0, 300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].timestamp.timestamp(), 1_700_000_200);
    }

    #[tokio::test]
    async fn absent_source_reports_none_not_error() {
        let mut source = MemoryPunchSource::new("archive_2023", vec![event(0)]);
        source.absent = true;
        assert!(source.try_fetch(None, &window(0, 300)).await.unwrap().is_none());
    }
}
