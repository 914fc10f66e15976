use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::attendance::AttendanceStatus;

/// Daily aggregate per employee; locked rows are frozen for payroll.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DaySummary {
    pub id: u64,
    pub employee_id: u64,
    pub work_date: NaiveDate,
    #[schema(value_type = String)]
    pub hours_worked: Decimal,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub is_locked: bool,
    pub locked_by: Option<u64>,
    pub locked_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}
