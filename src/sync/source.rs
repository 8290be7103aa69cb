use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::MySqlPool;
use tracing::debug;

use crate::error::EngineError;
use crate::model::punch::{PunchEvent, PunchKind};
use crate::sync::{local_to_utc, utc_to_local};

/// UTC bounds of one fetch. The coordinator widens the requested date range
/// before building this so night-shift punches on neighbouring days land in
/// the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One external punch store. Sources are queried independently; a source
/// whose backing table does not exist reports `Ok(None)` instead of failing,
/// since archival partitions may legitimately not exist yet for a period.
#[async_trait]
pub trait PunchSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Fetch events inside `window`, strictly after `since` when given.
    /// Returns `Ok(None)` when the source is absent for this period.
    /// Timestamps are UTC-normalized before leaving this layer.
    async fn try_fetch(
        &self,
        since: Option<DateTime<Utc>>,
        window: &FetchWindow,
    ) -> Result<Option<Vec<PunchEvent>>, EngineError>;
}

/// A MySQL mirror of the hardware log — the live table or one archival
/// partition. All mirrors share the legacy column layout.
pub struct MySqlPunchSource {
    pool: MySqlPool,
    table: String,
    tz_offset_minutes: i32,
}

#[derive(sqlx::FromRow)]
struct PunchRow {
    device_user_id: Option<String>,
    punch_time: NaiveDateTime,
    punch_type: Option<String>,
}

impl MySqlPunchSource {
    pub fn new(pool: MySqlPool, table: String, tz_offset_minutes: i32) -> Self {
        Self {
            pool,
            table,
            tz_offset_minutes,
        }
    }
}

#[async_trait]
impl PunchSource for MySqlPunchSource {
    fn source_id(&self) -> &str {
        &self.table
    }

    async fn try_fetch(
        &self,
        since: Option<DateTime<Utc>>,
        window: &FetchWindow,
    ) -> Result<Option<Vec<PunchEvent>>, EngineError> {
        // Mirror tables store site-local wall time.
        let start = utc_to_local(window.start, self.tz_offset_minutes);
        let end = utc_to_local(window.end, self.tz_offset_minutes);

        let mut sql = format!(
            "SELECT device_user_id, punch_time, punch_type FROM {} \
             WHERE punch_time >= ? AND punch_time < ?",
            self.table
        );
        if since.is_some() {
            sql.push_str(" AND punch_time > ?");
        }
        sql.push_str(" ORDER BY punch_time ASC");

        debug!(sql = %sql, source = %self.table, "Querying punch source");

        let mut query = sqlx::query_as::<_, PunchRow>(&sql).bind(start).bind(end);
        if let Some(since) = since {
            query = query.bind(utc_to_local(since, self.tz_offset_minutes));
        }

        let rows = match query.fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                // SQLSTATE 42S02: table doesn't exist. Expected for archival
                // partitions that have not been rolled yet.
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("42S02") {
                        return Ok(None);
                    }
                }
                return Err(EngineError::SourceUnavailable {
                    source_name: self.table.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let events = rows
            .into_iter()
            .filter_map(|row| {
                let employee_ref = row.device_user_id?.trim().to_string();
                if employee_ref.is_empty() {
                    return None;
                }
                Some(PunchEvent {
                    source_id: self.table.clone(),
                    employee_ref,
                    timestamp: local_to_utc(row.punch_time, self.tz_offset_minutes),
                    kind: PunchKind::from_device_code(row.punch_type.as_deref()),
                })
            })
            .collect();

        Ok(Some(events))
    }
}
