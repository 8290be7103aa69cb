pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::punch::PunchEvent;
use crate::model::shift::Shift;
use crate::model::sync_run::SyncRun;

/// Whether an upsert landed as a fresh row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Tenant/employee directory, consumed read-only.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Active employees of the tenant, optionally restricted to an explicit
    /// id subset.
    async fn employees_in_scope(
        &self,
        tenant_id: u64,
        ids: Option<&[u64]>,
    ) -> Result<Vec<Employee>, EngineError>;

    /// Resolve a hardware-reported reference to an employee id, or `None`
    /// when nobody is enrolled under it.
    async fn resolve_device_ref(
        &self,
        tenant_id: u64,
        employee_ref: &str,
    ) -> Result<Option<u64>, EngineError>;

    async fn shift_for(&self, tenant_id: u64, shift_id: u64)
        -> Result<Option<Shift>, EngineError>;
}

/// Transactional persistence for reconciliation output.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Atomic upsert keyed by `(employee_id, date)`. Last writer wins; both
    /// writers derive from the same immutable punch history.
    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<UpsertOutcome, EngineError>;

    async fn append_sync_run(&self, run: &SyncRun) -> Result<(), EngineError>;

    /// Watermark of the most recent run, if any.
    async fn latest_watermark(&self, tenant_id: u64)
        -> Result<Option<DateTime<Utc>>, EngineError>;

    /// Flag raw events as consumed. Idempotent: re-marking an already
    /// processed event is a no-op.
    async fn mark_processed(&self, events: &[PunchEvent]) -> Result<(), EngineError>;
}

// Stores are often shared between the reconciler and its caller.
#[async_trait]
impl<T: AttendanceStore + ?Sized> AttendanceStore for std::sync::Arc<T> {
    async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<UpsertOutcome, EngineError> {
        (**self).upsert_attendance(record).await
    }

    async fn append_sync_run(&self, run: &SyncRun) -> Result<(), EngineError> {
        (**self).append_sync_run(run).await
    }

    async fn latest_watermark(
        &self,
        tenant_id: u64,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        (**self).latest_watermark(tenant_id).await
    }

    async fn mark_processed(&self, events: &[PunchEvent]) -> Result<(), EngineError> {
        (**self).mark_processed(events).await
    }
}
