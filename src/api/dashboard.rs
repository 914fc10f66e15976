use std::collections::BTreeMap;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{activity::Activity, payslip::PayslipStatus},
    payroll::{
        reconcile,
        rollup::{self, MonthPoint, PayrollKpis, RunTotals},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const UPCOMING_LIMIT: i64 = 10;
const EVOLUTION_RUNS: i64 = 6;
const ACTIVITY_LIMIT: i64 = 10;

#[derive(Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// SUPER_ADMIN only; others always see their own enterprise
    pub enterprise_id: Option<u64>,
}

#[derive(Debug, sqlx::FromRow)]
struct UpcomingRow {
    payslip_id: u64,
    pay_run_id: u64,
    employee_id: u64,
    employee_name: String,
    period_end: NaiveDate,
    net: Decimal,
    total_paid: Decimal,
    #[sqlx(try_from = "String")]
    status: PayslipStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpcomingPayment {
    pub payslip_id: u64,
    pub pay_run_id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(value_type = String)]
    pub net: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    pub status: PayslipStatus,
}

impl From<UpcomingRow> for UpcomingPayment {
    fn from(row: UpcomingRow) -> Self {
        Self {
            payslip_id: row.payslip_id,
            pay_run_id: row.pay_run_id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            period_end: row.period_end,
            net: row.net,
            remaining: reconcile::remaining(row.net, row.total_paid),
            status: row.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GlobalStats {
    pub enterprises: i64,
    pub active_enterprises: i64,
    pub users: i64,
    pub employees: i64,
    pub active_employees: i64,
    /// Pay run count keyed by status
    pub pay_runs: BTreeMap<String, i64>,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
}

async fn latest_pay_run(pool: &MySqlPool, scope: Option<u64>) -> AppResult<Option<u64>> {
    let id = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT id
        FROM pay_runs
        WHERE status IN ('APPROVED', 'CLOSED')
          AND (? IS NULL OR enterprise_id = ?)
        ORDER BY period_end DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(scope)
    .bind(scope)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

async fn run_amounts(pool: &MySqlPool, pay_run_id: Option<u64>) -> AppResult<(Decimal, Decimal)> {
    let Some(id) = pay_run_id else {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    };
    let amounts = sqlx::query_as::<_, (Decimal, Decimal)>(
        "SELECT COALESCE(SUM(gross), 0), COALESCE(SUM(net), 0) FROM payslips WHERE pay_run_id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(amounts)
}

async fn run_paid(pool: &MySqlPool, pay_run_id: Option<u64>) -> AppResult<Decimal> {
    let Some(id) = pay_run_id else {
        return Ok(Decimal::ZERO);
    };
    let paid = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(pm.amount), 0)
        FROM payments pm
        JOIN payslips p ON p.id = pm.payslip_id
        WHERE p.pay_run_id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(paid)
}

async fn active_employees(pool: &MySqlPool, scope: Option<u64>) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM employees WHERE is_active = TRUE AND (? IS NULL OR enterprise_id = ?)",
    )
    .bind(scope)
    .bind(scope)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Figures of the latest approved or closed pay run
#[utoipa::path(
    get,
    path = "/api/dashboard/kpis",
    params(DashboardQuery),
    responses((status = 200, body = PayrollKpis)),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn kpis(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;
    let pool = pool.get_ref();

    let pay_run_id = latest_pay_run(pool, scope).await?;
    let ((gross, net), paid, employees) = futures::try_join!(
        run_amounts(pool, pay_run_id),
        run_paid(pool, pay_run_id),
        active_employees(pool, scope),
    )?;

    Ok(HttpResponse::Ok().json(PayrollKpis::compute(pay_run_id, gross, net, paid, employees)))
}

/// Gross and paid per month over the last six pay runs, oldest first
#[utoipa::path(
    get,
    path = "/api/dashboard/evolution",
    params(DashboardQuery),
    responses((status = 200, body = [MonthPoint])),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn evolution(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;

    let runs = sqlx::query_as::<_, RunTotals>(
        r#"
        SELECT r.id AS pay_run_id, r.created_at,
               COALESCE((SELECT SUM(p.gross) FROM payslips p WHERE p.pay_run_id = r.id), 0) AS gross,
               COALESCE((SELECT SUM(pm.amount)
                         FROM payments pm
                         JOIN payslips p ON p.id = pm.payslip_id
                         WHERE p.pay_run_id = r.id), 0) AS paid
        FROM pay_runs r
        WHERE (? IS NULL OR r.enterprise_id = ?)
        ORDER BY r.created_at DESC, r.id DESC
        LIMIT ?
        "#,
    )
    .bind(scope)
    .bind(scope)
    .bind(EVOLUTION_RUNS)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rollup::group_by_month(&runs)))
}

/// Next payslips to settle, earliest period end first
#[utoipa::path(
    get,
    path = "/api/dashboard/upcoming",
    params(DashboardQuery),
    responses((status = 200, body = [UpcomingPayment])),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn upcoming(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;

    let rows = sqlx::query_as::<_, UpcomingRow>(
        r#"
        SELECT p.id AS payslip_id, p.pay_run_id, p.employee_id, e.full_name AS employee_name,
               r.period_end, p.net,
               COALESCE((SELECT SUM(pm.amount) FROM payments pm WHERE pm.payslip_id = p.id), 0) AS total_paid,
               p.status
        FROM payslips p
        JOIN pay_runs r ON r.id = p.pay_run_id
        JOIN employees e ON e.id = p.employee_id
        WHERE p.status IN ('PENDING', 'PARTIAL')
          AND (? IS NULL OR r.enterprise_id = ?)
        ORDER BY r.period_end ASC, p.id ASC
        LIMIT ?
        "#,
    )
    .bind(scope)
    .bind(scope)
    .bind(UPCOMING_LIMIT)
    .fetch_all(pool.get_ref())
    .await?;

    let upcoming: Vec<UpcomingPayment> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(upcoming))
}

async fn count(pool: &MySqlPool, sql: &str) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?)
}

/// Platform-wide counters
#[utoipa::path(
    get,
    path = "/api/dashboard/global",
    responses((status = 200, body = GlobalStats), (status = 403, description = "SUPER_ADMIN only")),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn global_stats(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_super_admin()?;
    let pool = pool.get_ref();

    let pay_runs = async {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM pay_runs GROUP BY status",
        )
        .fetch_all(pool)
        .await?;
        Ok::<_, AppError>(rows.into_iter().collect::<BTreeMap<_, _>>())
    };
    let total_paid = async {
        let paid = sqlx::query_scalar::<_, Decimal>("SELECT COALESCE(SUM(amount), 0) FROM payments")
            .fetch_one(pool)
            .await?;
        Ok::<_, AppError>(paid)
    };

    let (enterprises, active_enterprises, users, employees, active, pay_runs, total_paid) = futures::try_join!(
        count(pool, "SELECT COUNT(*) FROM enterprises"),
        count(pool, "SELECT COUNT(*) FROM enterprises WHERE is_active = TRUE"),
        count(pool, "SELECT COUNT(*) FROM users"),
        count(pool, "SELECT COUNT(*) FROM employees"),
        count(pool, "SELECT COUNT(*) FROM employees WHERE is_active = TRUE"),
        pay_runs,
        total_paid,
    )?;

    Ok(HttpResponse::Ok().json(GlobalStats {
        enterprises,
        active_enterprises,
        users,
        employees,
        active_employees: active,
        pay_runs,
        total_paid,
    }))
}

/// Latest entries of the activity feed
#[utoipa::path(
    get,
    path = "/api/dashboard/activities",
    params(DashboardQuery),
    responses((status = 200, body = [Activity])),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn activities(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;

    let rows = sqlx::query_as::<_, Activity>(
        r#"
        SELECT id, enterprise_id, user_id, action, description, created_at
        FROM activities
        WHERE (? IS NULL OR enterprise_id = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(scope)
    .bind(scope)
    .bind(ACTIVITY_LIMIT)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_upcoming_remaining() {
        let row = UpcomingRow {
            payslip_id: 9,
            pay_run_id: 2,
            employee_id: 1,
            employee_name: "Awa Ndiaye".into(),
            period_end: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            net: dec!(500000),
            total_paid: dec!(200000),
            status: PayslipStatus::Partial,
        };

        let upcoming = UpcomingPayment::from(row);
        assert_eq!(upcoming.remaining, dec!(300000));
        assert_eq!(upcoming.status, PayslipStatus::Partial);
    }
}
