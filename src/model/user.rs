use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

/// Full row, password hash included. Never serialized.
#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role_id: u8,
    pub enterprise_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserSummary {
    pub id: u64,
    pub email: String,
    pub full_name: String,
    pub role_id: u8,
    pub enterprise_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub is_active: bool,
    pub last_login_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
