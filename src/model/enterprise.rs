use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PayPeriodType {
    Monthly,
    Weekly,
    Daily,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Sen Services",
        "address": "12 avenue Cheikh Anta Diop, Dakar",
        "currency": "XOF",
        "pay_period_type": "MONTHLY",
        "logo_path": "uploads/logos/sen-services.png",
        "is_active": true,
        "created_by": 1,
        "created_at": "2026-01-01T09:00:00"
    })
)]
pub struct Enterprise {
    pub id: u64,
    pub name: String,
    pub address: Option<String>,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub pay_period_type: PayPeriodType,
    pub logo_path: Option<String>,
    pub is_active: bool,
    pub created_by: Option<u64>,
    pub created_at: NaiveDateTime,
}
