use crate::{
    api::paging,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::{ContractType, Employee},
        pay_run::PayRunStatus,
    },
    utils::{
        activity::{self, ActivityAction},
        db_utils::{ColumnKind, build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("full_name", ColumnKind::Text),
    ("position", ColumnKind::Text),
    ("contract_type", ColumnKind::OneOf(&["FIXED", "DAILY", "FEE"])),
    ("rate", ColumnKind::Decimal),
    ("bank_details", ColumnKind::OptionalText),
];

const EMPLOYEE_COLUMNS: &str =
    "id, enterprise_id, full_name, position, contract_type, rate, bank_details, is_active, created_at";

#[derive(Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateEmployee {
    /// Defaults to the caller's enterprise; required for SUPER_ADMIN
    #[schema(example = 1)]
    pub enterprise_id: Option<u64>,
    #[validate(length(min = 1, max = 191))]
    #[schema(example = "Awa Ndiaye")]
    pub full_name: String,
    #[validate(length(min = 1, max = 191))]
    #[schema(example = "Comptable")]
    pub position: String,
    pub contract_type: ContractType,
    #[schema(value_type = String, example = "500000")]
    pub rate: Decimal,
    pub bank_details: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub enterprise_id: Option<u64>,
    pub is_active: Option<bool>,
    pub contract_type: Option<ContractType>,
    /// Search by name or position
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

pub async fn fetch_employee(pool: &MySqlPool, id: u64) -> AppResult<Employee> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Employee"))
}

/// Loads an employee and checks the caller may see it.
pub async fn fetch_visible_employee(
    pool: &MySqlPool,
    auth: &AuthUser,
    id: u64,
) -> AppResult<Employee> {
    let employee = fetch_employee(pool, id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    auth.ensure_employee(employee.id)?;
    Ok(employee)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 403)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let enterprise_id = auth
        .scope(payload.enterprise_id)?
        .ok_or_else(|| AppError::Validation("enterprise_id is required".into()))?;

    if payload.rate.is_sign_negative() {
        return Err(AppError::Validation("rate must not be negative".into()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (enterprise_id, full_name, position, contract_type, rate, bank_details)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(enterprise_id)
    .bind(payload.full_name.trim())
    .bind(payload.position.trim())
    .bind(payload.contract_type.as_ref())
    .bind(payload.rate)
    .bind(&payload.bank_details)
    .execute(pool.get_ref())
    .await?;

    let employee = fetch_employee(pool.get_ref(), result.last_insert_id()).await?;

    info!(employee_id = employee.id, enterprise_id, "Employee created");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(enterprise_id),
        ActivityAction::EmployeeCreated,
        format!("Employee {} added", employee.full_name),
    )
    .await;

    Ok(HttpResponse::Created().json(employee))
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, enterprise_id: Option<u64>, query: &EmployeeQuery) {
    qb.push(" WHERE 1 = 1");

    if let Some(enterprise_id) = enterprise_id {
        qb.push(" AND enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(contract_type) = query.contract_type {
        qb.push(" AND contract_type = ")
            .push_bind(contract_type.as_ref().to_string());
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        qb.push(" AND (full_name LIKE ")
            .push_bind(like.clone())
            .push(" OR position LIKE ")
            .push_bind(like)
            .push(")");
    }
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses((status = 200, description = "Paginated employee list", body = EmployeeListResponse)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM employees");
    push_filters(&mut count_qb, scope, &query);
    debug!(sql = %count_qb.sql(), "Counting employees");
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data_qb = QueryBuilder::<MySql>::new(format!("SELECT {EMPLOYEE_COLUMNS} FROM employees"));
    push_filters(&mut data_qb, scope, &query);
    data_qb
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);

    let data = data_qb
        .build_query_as::<Employee>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee = fetch_visible_employee(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee (partial)
#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    request_body(content = Object, example = json!({"position": "Chef comptable", "rate": "650000"})),
    responses(
        (status = 200, body = Employee),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let current = fetch_employee(pool.get_ref(), employee_id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;

    let update = build_update_sql("employees", &body, UPDATABLE, "id", employee_id)?;
    execute_update(pool.get_ref(), update).await?;

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    info!(employee_id, "Employee updated");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(employee.enterprise_id),
        ActivityAction::EmployeeUpdated,
        format!("Employee {} updated", employee.full_name),
    )
    .await;

    Ok(HttpResponse::Ok().json(employee))
}

/// Flip the active flag. Inactive employees get no payslip in new pay runs.
#[utoipa::path(
    patch,
    path = "/api/employees/{id}/toggle",
    params(("id", Path, description = "Employee ID")),
    responses((status = 200, body = Employee), (status = 404)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn toggle_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let current = fetch_employee(pool.get_ref(), employee_id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;

    sqlx::query("UPDATE employees SET is_active = NOT is_active WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    activity::record(
        pool.get_ref(),
        &auth,
        Some(employee.enterprise_id),
        ActivityAction::EmployeeToggled,
        format!(
            "Employee {} {}",
            employee.full_name,
            if employee.is_active { "activated" } else { "deactivated" }
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 400, description = "Employee has payslips in approved or closed pay runs"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let current = fetch_employee(pool.get_ref(), employee_id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;

    let mut tx = pool.begin().await?;
    // Locks the pay runs so none can be approved while the delete is decided.
    let settled: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM payslips ps
        JOIN pay_runs pr ON pr.id = ps.pay_run_id
        WHERE ps.employee_id = ? AND pr.status <> ?
        FOR UPDATE
        "#,
    )
    .bind(employee_id)
    .bind(PayRunStatus::Draft.as_ref())
    .fetch_one(&mut *tx)
    .await?;
    ensure_deletable(settled)?;

    let drafts = sqlx::query("DELETE FROM payslips WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(employee_id, draft_payslips = drafts, "Employee deleted");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(current.enterprise_id),
        ActivityAction::EmployeeDeleted,
        format!("Employee {} deleted", current.full_name),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Payslips of approved or closed runs keep their employee; such employees
/// can only be deactivated.
fn ensure_deletable(settled_payslips: i64) -> AppResult<()> {
    if settled_payslips > 0 {
        return Err(AppError::BusinessRule(format!(
            "Employee has {settled_payslips} payslip(s) in approved or closed pay runs; deactivate instead"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_with_settled_payslips_is_kept() {
        assert!(ensure_deletable(0).is_ok());
        assert!(matches!(ensure_deletable(1), Err(AppError::BusinessRule(_))));
        assert!(matches!(ensure_deletable(12), Err(AppError::BusinessRule(_))));
    }
}
