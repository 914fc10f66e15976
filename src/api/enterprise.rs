use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::enterprise::{Enterprise, PayPeriodType},
    utils::{
        activity::{self, ActivityAction},
        db_utils::{ColumnKind, build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("address", ColumnKind::OptionalText),
    ("currency", ColumnKind::Text),
    ("pay_period_type", ColumnKind::OneOf(&["MONTHLY", "WEEKLY", "DAILY"])),
    ("logo_path", ColumnKind::OptionalText),
];

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateEnterprise {
    #[validate(length(min = 1, max = 191))]
    #[schema(example = "Sen Services")]
    pub name: String,
    #[schema(example = "12 avenue Cheikh Anta Diop, Dakar")]
    pub address: Option<String>,
    /// ISO code, defaults to XOF
    #[validate(length(min = 3, max = 8))]
    #[schema(example = "XOF")]
    pub currency: Option<String>,
    pub pay_period_type: Option<PayPeriodType>,
    /// Path of an already stored logo file
    #[schema(example = "uploads/logos/sen-services.png")]
    pub logo_path: Option<String>,
}

pub async fn fetch_enterprise(pool: &MySqlPool, id: u64) -> AppResult<Enterprise> {
    sqlx::query_as::<_, Enterprise>(
        r#"
        SELECT id, name, address, currency, pay_period_type, logo_path, is_active,
               created_by, created_at
        FROM enterprises
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Enterprise"))
}

/// Create Enterprise
#[utoipa::path(
    post,
    path = "/api/enterprises",
    request_body = CreateEnterprise,
    responses(
        (status = 201, body = Enterprise),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "SUPER_ADMIN only")
    ),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn create_enterprise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEnterprise>,
) -> AppResult<HttpResponse> {
    auth.require_super_admin()?;
    payload.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO enterprises (name, address, currency, pay_period_type, logo_path, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.address)
    .bind(payload.currency.as_deref().unwrap_or("XOF").to_uppercase())
    .bind(payload.pay_period_type.unwrap_or(PayPeriodType::Monthly).as_ref())
    .bind(&payload.logo_path)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?;

    let enterprise = fetch_enterprise(pool.get_ref(), result.last_insert_id()).await?;

    info!(enterprise_id = enterprise.id, "Enterprise created");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(enterprise.id),
        ActivityAction::EnterpriseCreated,
        format!("Enterprise {} created", enterprise.name),
    )
    .await;

    Ok(HttpResponse::Created().json(enterprise))
}

/// List enterprises visible to the caller
#[utoipa::path(
    get,
    path = "/api/enterprises",
    responses((status = 200, body = [Enterprise])),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn list_enterprises(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let scope = auth.scope(None)?;

    let enterprises = sqlx::query_as::<_, Enterprise>(
        r#"
        SELECT id, name, address, currency, pay_period_type, logo_path, is_active,
               created_by, created_at
        FROM enterprises
        WHERE (? IS NULL OR id = ?)
        ORDER BY name
        "#,
    )
    .bind(scope)
    .bind(scope)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(enterprises))
}

#[utoipa::path(
    get,
    path = "/api/enterprises/{id}",
    params(("id", description = "Enterprise ID")),
    responses((status = 200, body = Enterprise), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn get_enterprise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    auth.ensure_enterprise(id)?;

    Ok(HttpResponse::Ok().json(fetch_enterprise(pool.get_ref(), id).await?))
}

/// Partial update: name, address, currency, pay_period_type, logo_path
#[utoipa::path(
    put,
    path = "/api/enterprises/{id}",
    params(("id", description = "Enterprise ID")),
    request_body(content = Object, example = json!({"name": "Sen Services SA", "pay_period_type": "WEEKLY"})),
    responses((status = 200, body = Enterprise), (status = 400), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn update_enterprise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    auth.ensure_enterprise(id)?;

    let update = build_update_sql("enterprises", &body, UPDATABLE, "id", id)?;
    execute_update(pool.get_ref(), update).await?;

    // rows_affected is 0 for a no-op update too, the fetch tells a missing row apart
    let enterprise = fetch_enterprise(pool.get_ref(), id).await?;
    activity::record(
        pool.get_ref(),
        &auth,
        Some(id),
        ActivityAction::EnterpriseUpdated,
        format!("Enterprise {} updated", enterprise.name),
    )
    .await;

    Ok(HttpResponse::Ok().json(enterprise))
}

/// Flip the active flag
#[utoipa::path(
    patch,
    path = "/api/enterprises/{id}/toggle",
    params(("id", description = "Enterprise ID")),
    responses((status = 200, body = Enterprise), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn toggle_enterprise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    auth.ensure_enterprise(id)?;

    let result = sqlx::query("UPDATE enterprises SET is_active = NOT is_active WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Enterprise"));
    }

    let enterprise = fetch_enterprise(pool.get_ref(), id).await?;
    info!(enterprise_id = id, is_active = enterprise.is_active, "Enterprise toggled");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(id),
        ActivityAction::EnterpriseToggled,
        format!(
            "Enterprise {} {}",
            enterprise.name,
            if enterprise.is_active { "activated" } else { "deactivated" }
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(enterprise))
}

#[utoipa::path(
    delete,
    path = "/api/enterprises/{id}",
    params(("id", description = "Enterprise ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "SUPER_ADMIN only"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Enterprise"
)]
pub async fn delete_enterprise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_super_admin()?;
    let id = path.into_inner();

    // Pay runs go first: payslips block employee deletion.
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM pay_runs WHERE enterprise_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM enterprises WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Enterprise"));
    }
    tx.commit().await?;

    info!(enterprise_id = id, "Enterprise deleted");
    activity::record(
        pool.get_ref(),
        &auth,
        None,
        ActivityAction::EnterpriseDeleted,
        format!("Enterprise #{id} deleted"),
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
