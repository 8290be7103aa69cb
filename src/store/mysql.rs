use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use moka::future::Cache;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::debug;

use crate::error::EngineError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::punch::PunchEvent;
use crate::model::shift::Shift;
use crate::model::sync_run::SyncRun;
use crate::store::{AttendanceStore, EmployeeDirectory, UpsertOutcome};
use crate::sync::utc_to_local;

/// Device-ref lookups repeat on every scheduled run, so resolved ids are
/// kept warm across runs. Misses are not cached; a newly enrolled employee
/// becomes visible on the next punch.
const REF_CACHE_CAPACITY: u64 = 100_000;
const REF_CACHE_TTL_SECS: u64 = 86400;

pub struct MySqlEmployeeDirectory {
    pool: MySqlPool,
    ref_cache: Cache<String, u64>,
}

impl MySqlEmployeeDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            ref_cache: Cache::builder()
                .max_capacity(REF_CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(REF_CACHE_TTL_SECS))
                .build(),
        }
    }
}

#[async_trait]
impl EmployeeDirectory for MySqlEmployeeDirectory {
    async fn employees_in_scope(
        &self,
        tenant_id: u64,
        ids: Option<&[u64]>,
    ) -> Result<Vec<Employee>, EngineError> {
        let base = "SELECT id, tenant_id, employee_code, first_name, last_name, \
                    device_user_id, shift_id, is_active \
                    FROM employees WHERE tenant_id = ? AND is_active = 1";

        let employees = match ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!("{} AND id IN ({})", base, placeholders);
                debug!(sql = %sql, tenant_id, "Fetching employee subset");

                let mut query = sqlx::query_as::<_, Employee>(&sql).bind(tenant_id);
                for id in ids {
                    query = query.bind(id);
                }
                query.fetch_all(&self.pool).await?
            }
            _ => {
                sqlx::query_as::<_, Employee>(base)
                    .bind(tenant_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(employees)
    }

    async fn resolve_device_ref(
        &self,
        tenant_id: u64,
        employee_ref: &str,
    ) -> Result<Option<u64>, EngineError> {
        let cache_key = format!("{}:{}", tenant_id, employee_ref);
        if let Some(id) = self.ref_cache.get(&cache_key).await {
            return Ok(Some(id));
        }

        let id = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT id FROM employees
            WHERE tenant_id = ? AND (device_user_id = ? OR employee_code = ?)
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(employee_ref)
        .bind(employee_ref)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = id {
            self.ref_cache.insert(cache_key, id).await;
        }

        Ok(id)
    }

    async fn shift_for(
        &self,
        tenant_id: u64,
        shift_id: u64,
    ) -> Result<Option<Shift>, EngineError> {
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, tenant_id, name, start_time, end_time,
                   grace_in_minutes, grace_out_minutes, is_overnight
            FROM shifts
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
    /// Live mirror table that carries the is_processed flag.
    punch_table: String,
    tz_offset_minutes: i32,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool, punch_table: String, tz_offset_minutes: i32) -> Self {
        Self {
            pool,
            punch_table,
            tz_offset_minutes,
        }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<UpsertOutcome, EngineError> {
        let raw_punches = serde_json::to_string(&record.raw_punches)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_logs
            (tenant_id, employee_id, date, first_in, last_out, total_span_hours,
             worked_hours, late_minutes, early_departure_minutes, punch_count,
             status, raw_punches)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                first_in = VALUES(first_in),
                last_out = VALUES(last_out),
                total_span_hours = VALUES(total_span_hours),
                worked_hours = VALUES(worked_hours),
                late_minutes = VALUES(late_minutes),
                early_departure_minutes = VALUES(early_departure_minutes),
                punch_count = VALUES(punch_count),
                status = VALUES(status),
                raw_punches = VALUES(raw_punches)
            "#,
        )
        .bind(record.tenant_id)
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.first_in)
        .bind(record.last_out)
        .bind(record.total_span_hours)
        .bind(record.worked_hours)
        .bind(record.late_minutes)
        .bind(record.early_departure_minutes)
        .bind(record.punch_count)
        .bind(record.status.to_string())
        .bind(raw_punches)
        .execute(&self.pool)
        .await?;

        // MySQL reports 1 affected row for an insert, 2 for an overwrite.
        if result.rows_affected() == 1 {
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn append_sync_run(&self, run: &SyncRun) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs
            (tenant_id, started_at, source_cutoff, records_processed, status, message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.tenant_id)
        .bind(run.started_at)
        .bind(run.source_cutoff)
        .bind(run.records_processed)
        .bind(run.status.to_string())
        .bind(&run.message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_watermark(
        &self,
        tenant_id: u64,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let cutoff = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT source_cutoff FROM sync_runs
            WHERE tenant_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cutoff)
    }

    async fn mark_processed(&self, events: &[PunchEvent]) -> Result<(), EngineError> {
        // The mirror table keys punches the same way dedup does, so the
        // UPDATE is a no-op for rows already flagged.
        let sql = format!(
            "UPDATE {} SET is_processed = 1, processed_at = NOW() \
             WHERE device_user_id = ? AND punch_time = ?",
            self.punch_table
        );

        for event in events {
            let local: NaiveDateTime = utc_to_local(event.timestamp, self.tz_offset_minutes);
            sqlx::query(&sql)
                .bind(&event.employee_ref)
                .bind(local)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}
