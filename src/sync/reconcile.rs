use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::punch::PunchEvent;
use crate::model::sync_run::{RunStatus, RunSummary, SyncRun};
use crate::store::{AttendanceStore, EmployeeDirectory, UpsertOutcome};
use crate::sync::dedup::dedupe;
use crate::sync::metrics::compute_day;
use crate::sync::shift::{logical_cutoff_hour, logical_date, resolve};
use crate::sync::source::{FetchWindow, PunchSource};
use crate::sync::{local_to_utc, utc_to_local};

/// Slack applied around the requested range when querying sources, so
/// night-shift punches on neighbouring calendar days land in the window.
const WINDOW_SLACK_BEFORE_HOURS: i64 = 12;
const WINDOW_SLACK_AFTER_HOURS: i64 = 36;

/// How far back the first incremental run reaches when no watermark exists.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub worker_count: usize,
    pub late_threshold_minutes: i64,
    pub tz_offset_minutes: i32,
}

impl From<&Config> for ReconcilerOptions {
    fn from(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            late_threshold_minutes: config.late_threshold_minutes,
            tz_offset_minutes: config.tz_offset_minutes,
        }
    }
}

#[derive(Debug, Default)]
struct EmployeeStats {
    created: u32,
    updated: u32,
    failed_records: u32,
}

/// Orchestrates one reconciliation run: fetch, dedupe, resolve, compute,
/// upsert, audit. Employees are processed with bounded parallelism; their
/// attendance rows are disjoint, so no cross-employee synchronization exists.
pub struct Reconciler<D, S> {
    directory: D,
    store: S,
    sources: Vec<Box<dyn PunchSource>>,
    opts: ReconcilerOptions,
}

impl<D, S> Reconciler<D, S>
where
    D: EmployeeDirectory,
    S: AttendanceStore,
{
    pub fn new(
        directory: D,
        store: S,
        sources: Vec<Box<dyn PunchSource>>,
        opts: ReconcilerOptions,
    ) -> Self {
        Self {
            directory,
            store,
            sources,
            opts,
        }
    }

    /// Incremental run: derive the range from the last recorded watermark,
    /// 24 hours back when none exists yet.
    pub async fn sync_incremental(&self, tenant_id: u64) -> Result<RunSummary, EngineError> {
        let watermark = self
            .store
            .latest_watermark(tenant_id)
            .await?
            .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_LOOKBACK_HOURS));

        let start = utc_to_local(watermark, self.opts.tz_offset_minutes).date();
        let end = utc_to_local(Utc::now(), self.opts.tz_offset_minutes).date();

        info!(tenant_id, %start, %end, "Incremental sync from watermark");
        self.reconcile(tenant_id, start, end, None).await
    }

    /// Reconcile every employee in scope over an explicit date range.
    ///
    /// Never raises for partial failures; those are counted in the summary.
    /// Raises only when the range is invalid or the run cannot start at all.
    pub async fn reconcile(
        &self,
        tenant_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        employee_ids: Option<&[u64]>,
    ) -> Result<RunSummary, EngineError> {
        if start > end {
            return Err(EngineError::InvalidDateRange { start, end });
        }

        let started_at = Utc::now();
        info!(tenant_id, %start, %end, "Reconciliation run started");

        match self.run_scope(tenant_id, start, end, employee_ids).await {
            Ok((summary, event_count, skipped_refs)) => {
                let status = if summary.failed > 0 {
                    RunStatus::PartialFailure
                } else {
                    RunStatus::Success
                };

                let mut message = format!(
                    "Synced {} attendance records from {} device logs",
                    summary.created + summary.updated,
                    event_count
                );
                if skipped_refs > 0 {
                    message.push_str(&format!(" ({} unmatched refs skipped)", skipped_refs));
                }

                self.store
                    .append_sync_run(&SyncRun {
                        tenant_id,
                        started_at,
                        source_cutoff: started_at,
                        records_processed: summary.created + summary.updated,
                        status,
                        message: message.clone(),
                    })
                    .await?;

                info!(tenant_id, %status, "Reconciliation run finished: {}", message);
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, tenant_id, "Reconciliation run failed");

                // Best effort: the audit trail should show failed runs too.
                // When even this write fails, the run's own error still
                // surfaces to the caller.
                if let Err(audit_err) = self
                    .store
                    .append_sync_run(&SyncRun {
                        tenant_id,
                        started_at,
                        source_cutoff: started_at,
                        records_processed: 0,
                        status: RunStatus::Failed,
                        message: e.to_string(),
                    })
                    .await
                {
                    error!(error = %audit_err, tenant_id, "Failed to record failed run");
                }

                Err(e)
            }
        }
    }

    async fn run_scope(
        &self,
        tenant_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        employee_ids: Option<&[u64]>,
    ) -> Result<(RunSummary, usize, u32), EngineError> {
        let employees = self
            .directory
            .employees_in_scope(tenant_id, employee_ids)
            .await?;
        debug!(tenant_id, count = employees.len(), "Employees in scope");

        let events = self.fetch_all_sources(start, end).await;
        let events = dedupe(events);
        let event_count = events.len();

        let (mut by_employee, skipped_refs) = self.group_by_employee(tenant_id, events).await;

        let outcomes: Vec<(u64, Result<EmployeeStats, EngineError>)> =
            stream::iter(employees.into_iter().map(|employee| {
                let punches = by_employee.remove(&employee.id).unwrap_or_default();
                let id = employee.id;
                async move {
                    (
                        id,
                        self.process_employee(tenant_id, employee, punches, start, end)
                            .await,
                    )
                }
            }))
            .buffer_unordered(self.opts.worker_count.max(1))
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (employee_id, outcome) in outcomes {
            match outcome {
                Ok(stats) => {
                    summary.processed += 1;
                    summary.created += stats.created;
                    summary.updated += stats.updated;
                    summary.failed += stats.failed_records;
                }
                Err(e) => {
                    error!(error = %e, employee_id, "Employee reconciliation failed");
                    summary.failed += 1;
                }
            }
        }

        Ok((summary, event_count, skipped_refs))
    }

    /// Query every configured source over the slack-extended window. A source
    /// that is absent or unreachable is not fatal; the run continues with the
    /// remaining sources.
    async fn fetch_all_sources(&self, start: NaiveDate, end: NaiveDate) -> Vec<PunchEvent> {
        let tz = self.opts.tz_offset_minutes;
        let window = FetchWindow {
            start: local_to_utc(start.and_time(NaiveTime::MIN), tz)
                - Duration::hours(WINDOW_SLACK_BEFORE_HOURS),
            end: local_to_utc(end.and_time(NaiveTime::MIN), tz)
                + Duration::hours(WINDOW_SLACK_AFTER_HOURS),
        };

        // The full window is always re-read; recomputing a day needs every
        // punch of that day, not just the ones newer than the watermark.
        let mut events = Vec::new();
        for source in &self.sources {
            match source.try_fetch(None, &window).await {
                Ok(Some(batch)) => {
                    debug!(source = source.source_id(), count = batch.len(), "Fetched punches");
                    events.extend(batch);
                }
                Ok(None) => {
                    warn!(source = source.source_id(), "Punch source absent for this period; skipping");
                }
                Err(e) => {
                    warn!(error = %e, source = source.source_id(), "Punch source unavailable; continuing without it");
                }
            }
        }
        events
    }

    /// Resolve device refs to employee ids and bucket events per employee.
    /// Punches nobody is enrolled under are skipped and counted.
    async fn group_by_employee(
        &self,
        tenant_id: u64,
        events: Vec<PunchEvent>,
    ) -> (HashMap<u64, Vec<PunchEvent>>, u32) {
        let mut resolved: HashMap<String, Option<u64>> = HashMap::new();
        let mut by_employee: HashMap<u64, Vec<PunchEvent>> = HashMap::new();
        let mut skipped = 0u32;

        for event in events {
            let employee_id = match resolved.get(&event.employee_ref) {
                Some(id) => *id,
                None => {
                    let id = match self
                        .directory
                        .resolve_device_ref(tenant_id, &event.employee_ref)
                        .await
                    {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(error = %e, employee_ref = %event.employee_ref, "Device ref lookup failed; skipping its punches");
                            None
                        }
                    };
                    resolved.insert(event.employee_ref.clone(), id);
                    id
                }
            };

            match employee_id {
                Some(id) => by_employee.entry(id).or_default().push(event),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(tenant_id, skipped, "Punches referenced no known employee");
        }

        (by_employee, skipped)
    }

    /// One employee's full date range: group punches by logical work date,
    /// compute metrics per day and upsert each record. Every date in range
    /// gets a row; dates with no punches reconcile as Absent.
    async fn process_employee(
        &self,
        tenant_id: u64,
        employee: Employee,
        mut punches: Vec<PunchEvent>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<EmployeeStats, EngineError> {
        let shift = match employee.shift_id {
            Some(shift_id) => self
                .directory
                .shift_for(tenant_id, shift_id)
                .await
                .map_err(|e| EngineError::Compute {
                    employee_id: employee.id,
                    reason: e.to_string(),
                })?,
            None => None,
        };

        punches.sort_by_key(|p| p.timestamp);

        let tz = self.opts.tz_offset_minutes;
        let cutoff = logical_cutoff_hour(shift.as_ref());
        let mut by_date: HashMap<NaiveDate, Vec<PunchEvent>> = HashMap::new();
        for punch in &punches {
            by_date
                .entry(logical_date(punch.timestamp, tz, cutoff))
                .or_default()
                .push(punch.clone());
        }

        let mut stats = EmployeeStats::default();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let day_punches = by_date.remove(&date).unwrap_or_default();
            let window = resolve(shift.as_ref(), date, tz);
            let metrics = compute_day(&day_punches, window.as_ref(), self.opts.late_threshold_minutes);

            let record = AttendanceRecord {
                tenant_id,
                employee_id: employee.id,
                date,
                first_in: metrics.first_in,
                last_out: metrics.last_out,
                total_span_hours: metrics.total_span_hours,
                worked_hours: metrics.worked_hours,
                late_minutes: metrics.late_minutes,
                early_departure_minutes: metrics.early_departure_minutes,
                punch_count: metrics.punch_count,
                status: metrics.status,
                raw_punches: day_punches,
            };

            match self.upsert_with_retry(&record).await {
                Ok(UpsertOutcome::Created) => stats.created += 1,
                Ok(UpsertOutcome::Updated) => stats.updated += 1,
                Err(e) => {
                    warn!(error = %e, employee_id = employee.id, %date, "Attendance upsert failed after retry");
                    stats.failed_records += 1;
                }
            }
        }

        // Separate idempotent side effect; a miss here just means the next
        // run re-marks the same events.
        if !punches.is_empty() {
            if let Err(e) = self.store.mark_processed(&punches).await {
                warn!(error = %e, employee_id = employee.id, "Failed to mark punches processed");
            }
        }

        Ok(stats)
    }

    async fn upsert_with_retry(
        &self,
        record: &AttendanceRecord,
    ) -> Result<UpsertOutcome, EngineError> {
        match self.store.upsert_attendance(record).await {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                warn!(error = %first, employee_id = record.employee_id, date = %record.date, "Attendance upsert failed; retrying once");
                self.store.upsert_attendance(record).await
            }
        }
    }
}
