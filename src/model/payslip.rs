use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PayslipStatus {
    Pending,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payslip {
    pub id: u64,
    pub pay_run_id: u64,
    pub employee_id: u64,
    /// Only set for daily-rate contracts.
    pub days_worked: Option<u32>,
    #[schema(value_type = String, example = "500000")]
    pub gross: Decimal,
    #[schema(value_type = String, example = "0")]
    pub deductions: Decimal,
    #[schema(value_type = String, example = "500000")]
    pub net: Decimal,
    #[sqlx(try_from = "String")]
    pub status: PayslipStatus,
    pub created_at: NaiveDateTime,
}

/// A payslip joined with its employee's name and the sum of its payments.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayslipLine {
    pub id: u64,
    pub pay_run_id: u64,
    pub employee_id: u64,
    #[schema(example = "Awa Ndiaye")]
    pub employee_name: String,
    pub days_worked: Option<u32>,
    #[schema(value_type = String, example = "500000")]
    pub gross: Decimal,
    #[schema(value_type = String, example = "0")]
    pub deductions: Decimal,
    #[schema(value_type = String, example = "500000")]
    pub net: Decimal,
    #[schema(value_type = String, example = "200000")]
    pub total_paid: Decimal,
    #[sqlx(try_from = "String")]
    pub status: PayslipStatus,
    pub created_at: NaiveDateTime,
}

pub const PAYSLIP_LINE_SELECT: &str = r#"
    SELECT p.id, p.pay_run_id, p.employee_id, e.full_name AS employee_name,
           p.days_worked, p.gross, p.deductions, p.net,
           COALESCE((SELECT SUM(pm.amount) FROM payments pm WHERE pm.payslip_id = p.id), 0) AS total_paid,
           p.status, p.created_at
    FROM payslips p
    JOIN employees e ON e.id = p.employee_id
    JOIN pay_runs r ON r.id = p.pay_run_id
"#;
