use std::collections::HashMap;

use crate::{
    api::{WRITE_BATCH, enterprise::fetch_enterprise},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::Employee,
        enterprise::PayPeriodType,
        pay_run::{PayRun, PayRunStatus},
        payslip::{PAYSLIP_LINE_SELECT, PayslipLine},
    },
    payroll::{
        lifecycle::{self, DaysSource, PayRunAction},
        rollup::PayRunTotals,
    },
    utils::activity::{self, ActivityAction},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const PAY_RUN_COLUMNS: &str = "id, enterprise_id, period_type, period_start, period_end, status, \
                               created_by, created_at, approved_at, closed_at";

#[derive(Deserialize, ToSchema)]
pub struct CreatePayRun {
    /// Required for SUPER_ADMIN, ignored otherwise
    pub enterprise_id: Option<u64>,
    /// Defaults to the enterprise's pay period type
    pub period_type: Option<PayPeriodType>,
    #[schema(value_type = String, format = "date", example = "2026-06-01")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-06-30")]
    pub period_end: NaiveDate,
    /// How daily-rate employees get their days worked
    #[serde(default)]
    pub days_source: DaysSource,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayRun {
    #[schema(value_type = Option<String>, format = "date")]
    pub period_start: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub period_end: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct PayRunQuery {
    pub enterprise_id: Option<u64>,
    pub status: Option<PayRunStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct PayRunDetail {
    pub pay_run: PayRun,
    pub payslips: Vec<PayslipLine>,
    pub totals: PayRunTotals,
}

fn ensure_period(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::Validation(
            "period_start must not be after period_end".into(),
        ));
    }
    Ok(())
}

pub async fn fetch_pay_run(pool: &MySqlPool, id: u64) -> AppResult<PayRun> {
    sqlx::query_as::<_, PayRun>(&format!("SELECT {PAY_RUN_COLUMNS} FROM pay_runs WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Pay run"))
}

async fn load_detail(pool: &MySqlPool, pay_run: PayRun) -> AppResult<PayRunDetail> {
    let payslips = sqlx::query_as::<_, PayslipLine>(&format!(
        "{PAYSLIP_LINE_SELECT} WHERE p.pay_run_id = ? ORDER BY e.full_name"
    ))
    .bind(pay_run.id)
    .fetch_all(pool)
    .await?;

    let totals = PayRunTotals::from_lines(&payslips);
    Ok(PayRunDetail {
        pay_run,
        payslips,
        totals,
    })
}

/// Create a DRAFT pay run with one payslip per active employee
#[utoipa::path(
    post,
    path = "/api/payruns",
    request_body = CreatePayRun,
    responses(
        (status = 201, body = PayRunDetail),
        (status = 400, description = "Invalid period"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn create_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayRun>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    ensure_period(payload.period_start, payload.period_end)?;

    let enterprise_id = auth
        .scope(payload.enterprise_id)?
        .ok_or_else(|| AppError::Validation("enterprise_id is required".into()))?;
    let enterprise = fetch_enterprise(pool.get_ref(), enterprise_id).await?;
    let period_type = payload.period_type.unwrap_or(enterprise.pay_period_type);

    let mut tx = pool.begin().await?;

    let pay_run_id = sqlx::query(
        r#"
        INSERT INTO pay_runs (enterprise_id, period_type, period_start, period_end, status, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(enterprise_id)
    .bind(period_type.as_ref())
    .bind(payload.period_start)
    .bind(payload.period_end)
    .bind(PayRunStatus::Draft.as_ref())
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let employees = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, enterprise_id, full_name, position, contract_type, rate, bank_details,
               is_active, created_at
        FROM employees
        WHERE enterprise_id = ? AND is_active = TRUE
        ORDER BY id
        "#,
    )
    .bind(enterprise_id)
    .fetch_all(&mut *tx)
    .await?;

    let worked: HashMap<u64, i64> = match payload.days_source {
        DaysSource::Calendar => HashMap::new(),
        DaysSource::Attendance => sqlx::query_as::<_, (u64, i64)>(
            r#"
            SELECT ds.employee_id, COUNT(*)
            FROM day_summaries ds
            JOIN employees e ON e.id = ds.employee_id
            WHERE e.enterprise_id = ?
              AND ds.work_date BETWEEN ? AND ?
              AND ds.status IN ('PRESENT', 'LATE')
            GROUP BY ds.employee_id
            "#,
        )
        .bind(enterprise_id)
        .bind(payload.period_start)
        .bind(payload.period_end)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect(),
    };

    let slips = lifecycle::generate_payslips(
        &employees,
        payload.period_start,
        payload.period_end,
        payload.days_source,
        |id| worked.get(&id).map_or(0, |n| u32::try_from(*n).unwrap_or(u32::MAX)),
    );

    for batch in slips.chunks(WRITE_BATCH) {
        let mut qb = QueryBuilder::<MySql>::new(
            "INSERT INTO payslips (pay_run_id, employee_id, days_worked, gross, deductions, net, status) ",
        );
        qb.push_values(batch, |mut row, slip| {
            row.push_bind(pay_run_id)
                .push_bind(slip.employee_id)
                .push_bind(slip.days_worked)
                .push_bind(slip.gross)
                .push_bind(slip.deductions)
                .push_bind(slip.net)
                .push_bind(slip.status.as_ref());
        });
        qb.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    info!(pay_run_id, enterprise_id, payslips = slips.len(), "Pay run created");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(enterprise_id),
        ActivityAction::PayRunCreated,
        format!(
            "Pay run {} to {} created with {} payslips",
            payload.period_start,
            payload.period_end,
            slips.len()
        ),
    )
    .await;

    let pay_run = fetch_pay_run(pool.get_ref(), pay_run_id).await?;
    Ok(HttpResponse::Created().json(load_detail(pool.get_ref(), pay_run).await?))
}

#[utoipa::path(
    get,
    path = "/api/payruns",
    params(PayRunQuery),
    responses((status = 200, body = [PayRun])),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn list_pay_runs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayRunQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;

    let mut qb = QueryBuilder::<MySql>::new(format!("SELECT {PAY_RUN_COLUMNS} FROM pay_runs WHERE 1 = 1"));
    if let Some(enterprise_id) = scope {
        qb.push(" AND enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    qb.push(" ORDER BY period_start DESC, id DESC");
    debug!(sql = %qb.sql(), "Listing pay runs");

    let pay_runs = qb.build_query_as::<PayRun>().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(pay_runs))
}

/// Pay run with its payslips and totals
#[utoipa::path(
    get,
    path = "/api/payruns/{id}",
    params(("id", description = "Pay run ID")),
    responses((status = 200, body = PayRunDetail), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn get_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let pay_run = fetch_pay_run(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_enterprise(pay_run.enterprise_id)?;

    Ok(HttpResponse::Ok().json(load_detail(pool.get_ref(), pay_run).await?))
}

/// Change the period of a DRAFT pay run. Payslip amounts are left as they are.
#[utoipa::path(
    put,
    path = "/api/payruns/{id}",
    params(("id", description = "Pay run ID")),
    request_body = UpdatePayRun,
    responses(
        (status = 200, body = PayRun),
        (status = 400, description = "Invalid period or pay run not DRAFT"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn update_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayRun>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let current = fetch_pay_run(pool.get_ref(), id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;
    lifecycle::ensure_editable(current.status)?;

    let start = payload.period_start.unwrap_or(current.period_start);
    let end = payload.period_end.unwrap_or(current.period_end);
    ensure_period(start, end)?;

    let result = sqlx::query(
        "UPDATE pay_runs SET period_start = ?, period_end = ? WHERE id = ? AND status = ?",
    )
    .bind(start)
    .bind(end)
    .bind(id)
    .bind(PayRunStatus::Draft.as_ref())
    .execute(pool.get_ref())
    .await?;
    if result.rows_affected() == 0 && (start, end) != (current.period_start, current.period_end) {
        return Err(AppError::BusinessRule("Pay run is no longer DRAFT".into()));
    }

    Ok(HttpResponse::Ok().json(fetch_pay_run(pool.get_ref(), id).await?))
}

/// Delete a DRAFT pay run together with its payslips and payments
#[utoipa::path(
    delete,
    path = "/api/payruns/{id}",
    params(("id", description = "Pay run ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 400, description = "Pay run not DRAFT"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn delete_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let current = fetch_pay_run(pool.get_ref(), id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;
    lifecycle::ensure_editable(current.status)?;

    let result = sqlx::query("DELETE FROM pay_runs WHERE id = ? AND status = ?")
        .bind(id)
        .bind(PayRunStatus::Draft.as_ref())
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::BusinessRule("Pay run is no longer DRAFT".into()));
    }

    info!(pay_run_id = id, "Pay run deleted");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(current.enterprise_id),
        ActivityAction::PayRunDeleted,
        format!("Pay run {} to {} deleted", current.period_start, current.period_end),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

async fn apply_transition(
    auth: &AuthUser,
    pool: &MySqlPool,
    id: u64,
    action: PayRunAction,
) -> AppResult<PayRun> {
    auth.require_admin()?;

    let current = fetch_pay_run(pool, id).await?;
    auth.ensure_enterprise(current.enterprise_id)?;
    let next = lifecycle::transition(current.status, action)?;

    let stamp = match action {
        PayRunAction::Approve => "approved_at",
        PayRunAction::Close => "closed_at",
    };

    // The status guard makes a concurrent transition lose instead of applying twice.
    let result = sqlx::query(&format!(
        "UPDATE pay_runs SET status = ?, {stamp} = NOW() WHERE id = ? AND status = ?"
    ))
    .bind(next.as_ref())
    .bind(id)
    .bind(current.status.as_ref())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::BusinessRule(
            "Invalid state: pay run changed concurrently".into(),
        ));
    }

    info!(pay_run_id = id, from = %current.status, to = %next, "Pay run transitioned");
    activity::record(
        pool,
        auth,
        Some(current.enterprise_id),
        match action {
            PayRunAction::Approve => ActivityAction::PayRunApproved,
            PayRunAction::Close => ActivityAction::PayRunClosed,
        },
        format!(
            "Pay run {} to {} is now {next}",
            current.period_start, current.period_end
        ),
    )
    .await;

    fetch_pay_run(pool, id).await
}

/// DRAFT → APPROVED
#[utoipa::path(
    post,
    path = "/api/payruns/{id}/approve",
    params(("id", description = "Pay run ID")),
    responses(
        (status = 200, body = PayRun),
        (status = 400, description = "Pay run is not DRAFT"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn approve_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let pay_run = apply_transition(&auth, pool.get_ref(), path.into_inner(), PayRunAction::Approve).await?;
    Ok(HttpResponse::Ok().json(pay_run))
}

/// APPROVED → CLOSED
#[utoipa::path(
    post,
    path = "/api/payruns/{id}/close",
    params(("id", description = "Pay run ID")),
    responses(
        (status = 200, body = PayRun),
        (status = 400, description = "Pay run is not APPROVED"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "PayRun"
)]
pub async fn close_pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let pay_run = apply_transition(&auth, pool.get_ref(), path.into_inner(), PayRunAction::Close).await?;
    Ok(HttpResponse::Ok().json(pay_run))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_must_be_ordered() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 6, day).unwrap();
        assert!(ensure_period(d(1), d(30)).is_ok());
        assert!(ensure_period(d(15), d(15)).is_ok());
        assert!(matches!(ensure_period(d(30), d(1)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_create_payload_defaults_to_calendar_days() {
        let payload: CreatePayRun = serde_json::from_value(json!({
            "period_start": "2026-06-01",
            "period_end": "2026-06-30"
        }))
        .unwrap();
        assert_eq!(payload.days_source, DaysSource::Calendar);
        assert!(payload.period_type.is_none());

        let payload: CreatePayRun = serde_json::from_value(json!({
            "period_start": "2026-06-01",
            "period_end": "2026-06-30",
            "days_source": "ATTENDANCE",
            "period_type": "WEEKLY"
        }))
        .unwrap();
        assert_eq!(payload.days_source, DaysSource::Attendance);
        assert_eq!(payload.period_type, Some(PayPeriodType::Weekly));
    }
}
