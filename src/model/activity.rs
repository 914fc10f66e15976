use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Activity {
    pub id: u64,
    pub enterprise_id: Option<u64>,
    pub user_id: Option<u64>,
    pub action: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}
