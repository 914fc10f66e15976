use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::enterprise::PayPeriodType;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PayRunStatus {
    Draft,
    Approved,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayRun {
    pub id: u64,
    pub enterprise_id: u64,
    #[sqlx(try_from = "String")]
    pub period_type: PayPeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: PayRunStatus,
    pub created_by: Option<u64>,
    pub created_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
}
