use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
    Sick,
}

impl AttendanceStatus {
    /// Days that count as worked when payroll reads attendance.
    pub fn is_worked(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Corrected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    /// Accumulated break time in seconds
    pub break_seconds: u32,
    #[schema(value_type = String, example = "8.25")]
    pub hours_worked: Decimal,
    #[schema(value_type = String, example = "0.25")]
    pub overtime_hours: Decimal,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[sqlx(try_from = "String")]
    pub approval_status: ApprovalStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

/// One append-only audit row; snapshots are free-form JSON.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceAudit {
    pub id: u64,
    pub attendance_id: u64,
    pub action: String,
    #[schema(value_type = Object, nullable = true)]
    pub old_value: Option<serde_json::Value>,
    #[schema(value_type = Object, nullable = true)]
    pub new_value: Option<serde_json::Value>,
    pub justification: Option<String>,
    pub performed_by: Option<u64>,
    pub created_at: NaiveDateTime,
}
