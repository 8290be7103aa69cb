use serde::{Deserialize, Serialize};

/// Read-only directory row. The engine never writes employees; it only needs
/// the device-user mapping and the assigned shift.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub tenant_id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub device_user_id: Option<String>,
    pub shift_id: Option<u64>,
    pub is_active: bool,
}

impl Employee {
    /// True when a hardware-reported reference identifies this employee.
    /// Device user id takes precedence; the employee code is the legacy
    /// fallback some devices were enrolled with.
    pub fn matches_ref(&self, employee_ref: &str) -> bool {
        self.device_user_id.as_deref() == Some(employee_ref)
            || self.employee_code == employee_ref
    }
}
