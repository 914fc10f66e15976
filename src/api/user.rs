use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::user::UserSummary,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams)]
pub struct UserQuery {
    /// SUPER_ADMIN only; others always see their own enterprise
    pub enterprise_id: Option<u64>,
}

const SUMMARY_COLUMNS: &str = "id, email, full_name, role_id, enterprise_id, employee_id, \
                               is_active, last_login_at, created_at";

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses((status = 200, body = [UserSummary]), (status = 403)),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let scope = auth.scope(query.enterprise_id)?;

    let users = sqlx::query_as::<_, UserSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM users WHERE (? IS NULL OR enterprise_id = ?) ORDER BY id"
    ))
    .bind(scope)
    .bind(scope)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

/// Enable or disable an account; a disabled user can no longer log in
#[utoipa::path(
    patch,
    path = "/api/users/{id}/toggle",
    params(("id", description = "User ID")),
    responses((status = 200, body = UserSummary), (status = 403), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn toggle_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    if id == auth.user_id {
        return Err(AppError::BusinessRule("You cannot disable your own account".into()));
    }

    let by_id = format!("SELECT {SUMMARY_COLUMNS} FROM users WHERE id = ?");

    let target = sqlx::query_as::<_, UserSummary>(&by_id)
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    match target.enterprise_id {
        Some(enterprise_id) => auth.ensure_enterprise(enterprise_id)?,
        None => auth.require_super_admin()?,
    }

    sqlx::query("UPDATE users SET is_active = NOT is_active WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    let updated = sqlx::query_as::<_, UserSummary>(&by_id)
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    info!(user_id = id, is_active = updated.is_active, "User toggled");

    Ok(HttpResponse::Ok().json(updated))
}
