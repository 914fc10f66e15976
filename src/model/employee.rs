use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// How an employee's `rate` turns into gross pay.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    /// Fixed salary per pay period.
    Fixed,
    /// Daily rate multiplied by days worked.
    Daily,
    /// Flat fee per pay period.
    Fee,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "enterprise_id": 1,
        "full_name": "Awa Ndiaye",
        "position": "Comptable",
        "contract_type": "FIXED",
        "rate": "500000",
        "bank_details": "SN012 01001 012345678901 23",
        "is_active": true,
        "created_at": "2026-01-01T09:00:00"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub enterprise_id: u64,

    #[schema(example = "Awa Ndiaye")]
    pub full_name: String,

    #[schema(example = "Comptable")]
    pub position: String,

    #[sqlx(try_from = "String")]
    pub contract_type: ContractType,

    /// Monthly salary, daily rate or fee depending on `contract_type`.
    #[schema(value_type = String, example = "500000")]
    pub rate: Decimal,

    #[schema(nullable = true)]
    pub bank_details: Option<String>,

    pub is_active: bool,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
