use std::collections::HashMap;

use crate::{
    api::{enterprise::fetch_enterprise, pay_run::fetch_pay_run, payment::PAYMENT_COLUMNS},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::{ContractType, Employee},
        pay_run::PayRunStatus,
        payment::Payment,
        payslip::{PAYSLIP_LINE_SELECT, PayslipLine, PayslipStatus},
    },
    payroll::{
        documents::{PayslipDocument, payslip_documents},
        lifecycle::{self, PayslipAmounts, PayslipEdit},
        reconcile,
    },
};
use actix_web::{HttpResponse, web};
use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

/// A payslip row locked for the rest of the transaction, with the fields of
/// its pay run and employee that writes depend on.
#[derive(Debug, sqlx::FromRow)]
pub struct LockedPayslip {
    pub id: u64,
    pub pay_run_id: u64,
    pub employee_id: u64,
    pub enterprise_id: u64,
    #[sqlx(try_from = "String")]
    pub run_status: PayRunStatus,
    #[sqlx(try_from = "String")]
    pub contract_type: ContractType,
    pub rate: Decimal,
    pub days_worked: Option<u32>,
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    #[sqlx(try_from = "String")]
    pub status: PayslipStatus,
}

impl LockedPayslip {
    fn amounts(&self) -> PayslipAmounts {
        PayslipAmounts {
            days_worked: self.days_worked,
            gross: self.gross,
            deductions: self.deductions,
            net: self.net,
            status: self.status,
        }
    }
}

pub async fn lock_payslip(tx: &mut Transaction<'_, MySql>, id: u64) -> AppResult<LockedPayslip> {
    sqlx::query_as::<_, LockedPayslip>(
        r#"
        SELECT p.id, p.pay_run_id, p.employee_id, r.enterprise_id, r.status AS run_status,
               e.contract_type, e.rate, p.days_worked, p.gross, p.deductions, p.net, p.status
        FROM payslips p
        JOIN pay_runs r ON r.id = p.pay_run_id
        JOIN employees e ON e.id = p.employee_id
        WHERE p.id = ?
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found("Payslip"))
}

/// Sum of the payslip's payments, leaving out `excluding` when given.
pub async fn paid_total(
    tx: &mut Transaction<'_, MySql>,
    payslip_id: u64,
    excluding: Option<u64>,
) -> AppResult<Decimal> {
    let total = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM payments
        WHERE payslip_id = ? AND (? IS NULL OR id <> ?)
        "#,
    )
    .bind(payslip_id)
    .bind(excluding)
    .bind(excluding)
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

pub async fn store_status(
    tx: &mut Transaction<'_, MySql>,
    payslip_id: u64,
    status: PayslipStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE payslips SET status = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(payslip_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn fetch_line(pool: &MySqlPool, id: u64) -> AppResult<PayslipLine> {
    sqlx::query_as::<_, PayslipLine>(&format!("{PAYSLIP_LINE_SELECT} WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Payslip"))
}

/// Loads a payslip line the caller may read: staff of its enterprise, or the
/// employee it belongs to.
async fn fetch_visible_line(pool: &MySqlPool, auth: &AuthUser, id: u64) -> AppResult<(PayslipLine, u64)> {
    let line = fetch_line(pool, id).await?;
    let enterprise_id: u64 = sqlx::query_scalar("SELECT enterprise_id FROM pay_runs WHERE id = ?")
        .bind(line.pay_run_id)
        .fetch_one(pool)
        .await?;

    auth.ensure_enterprise(enterprise_id)?;
    auth.ensure_employee(line.employee_id)?;
    Ok((line, enterprise_id))
}

async fn payments_of(pool: &MySqlPool, payslip_id: u64) -> AppResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payslip_id = ? ORDER BY paid_at, id"
    ))
    .bind(payslip_id)
    .fetch_all(pool)
    .await?;
    Ok(payments)
}

#[derive(Deserialize, IntoParams)]
pub struct PayslipQuery {
    pub enterprise_id: Option<u64>,
    pub pay_run_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub status: Option<PayslipStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayslip {
    /// Daily-rate contracts only; gross follows
    pub days_worked: Option<u32>,
    /// Fixed and fee contracts only
    #[schema(value_type = Option<String>)]
    pub gross: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub deductions: Option<Decimal>,
}

impl From<&UpdatePayslip> for PayslipEdit {
    fn from(u: &UpdatePayslip) -> Self {
        Self {
            days_worked: u.days_worked,
            gross: u.gross,
            deductions: u.deductions,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PayslipDetail {
    pub payslip: PayslipLine,
    pub payments: Vec<Payment>,
    #[schema(value_type = String)]
    pub remaining: Decimal,
}

#[utoipa::path(
    get,
    path = "/api/payslips",
    params(PayslipQuery),
    responses((status = 200, body = [PayslipLine])),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn list_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayslipQuery>,
) -> AppResult<HttpResponse> {
    let scope = auth.scope(query.enterprise_id)?;
    let employee_id = if auth.is_employee() {
        Some(
            auth.employee_id
                .ok_or_else(|| AppError::Forbidden("No employee record linked to this account".into()))?,
        )
    } else {
        query.employee_id
    };

    let mut qb = QueryBuilder::<MySql>::new(format!("{PAYSLIP_LINE_SELECT} WHERE 1 = 1"));
    if let Some(enterprise_id) = scope {
        qb.push(" AND r.enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(pay_run_id) = query.pay_run_id {
        qb.push(" AND p.pay_run_id = ").push_bind(pay_run_id);
    }
    if let Some(employee_id) = employee_id {
        qb.push(" AND p.employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND p.status = ").push_bind(status.as_ref().to_string());
    }
    qb.push(" ORDER BY r.period_end DESC, e.full_name");

    let lines = qb.build_query_as::<PayslipLine>().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(lines))
}

/// Payslip with its payments and the balance left to pay
#[utoipa::path(
    get,
    path = "/api/payslips/{id}",
    params(("id", description = "Payslip ID")),
    responses((status = 200, body = PayslipDetail), (status = 403), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let (line, _) = fetch_visible_line(pool.get_ref(), &auth, path.into_inner()).await?;
    let payments = payments_of(pool.get_ref(), line.id).await?;

    Ok(HttpResponse::Ok().json(PayslipDetail {
        remaining: reconcile::remaining(line.net, line.total_paid),
        payslip: line,
        payments,
    }))
}

/// Adjust days, gross or deductions while the pay run is DRAFT
#[utoipa::path(
    put,
    path = "/api/payslips/{id}",
    params(("id", description = "Payslip ID")),
    request_body = UpdatePayslip,
    responses(
        (status = 200, body = PayslipLine),
        (status = 400, description = "Pay run not DRAFT or amounts rejected"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn update_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayslip>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let locked = lock_payslip(&mut tx, id).await?;
    auth.ensure_enterprise(locked.enterprise_id)?;
    lifecycle::ensure_editable(locked.run_status)?;

    let paid = paid_total(&mut tx, id, None).await?;
    let updated = lifecycle::apply_payslip_edit(
        &locked.amounts(),
        locked.contract_type,
        locked.rate,
        &PayslipEdit::from(&*payload),
        paid,
    )?;

    sqlx::query(
        r#"
        UPDATE payslips
        SET days_worked = ?, gross = ?, deductions = ?, net = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(updated.days_worked)
    .bind(updated.gross)
    .bind(updated.deductions)
    .bind(updated.net)
    .bind(updated.status.as_ref())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(payslip_id = id, net = %updated.net, status = %updated.status, "Payslip updated");

    Ok(HttpResponse::Ok().json(fetch_line(pool.get_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/payslips/{id}",
    params(("id", description = "Payslip ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 400, description = "Pay run not DRAFT"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn delete_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let locked = lock_payslip(&mut tx, id).await?;
    auth.ensure_enterprise(locked.enterprise_id)?;
    lifecycle::ensure_editable(locked.run_status)?;

    sqlx::query("DELETE FROM payslips WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(payslip_id = id, pay_run_id = locked.pay_run_id, "Payslip deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

async fn employees_by_id(pool: &MySqlPool, pay_run_id: u64) -> AppResult<HashMap<u64, Employee>> {
    let employees = sqlx::query_as::<_, Employee>(
        r#"
        SELECT e.id, e.enterprise_id, e.full_name, e.position, e.contract_type, e.rate,
               e.bank_details, e.is_active, e.created_at
        FROM employees e
        JOIN payslips p ON p.employee_id = e.id
        WHERE p.pay_run_id = ?
        "#,
    )
    .bind(pay_run_id)
    .fetch_all(pool)
    .await?;

    Ok(employees.into_iter().map(|e| (e.id, e)).collect())
}

/// Printable payslip as structured data
#[utoipa::path(
    get,
    path = "/api/payslips/{id}/document",
    params(("id", description = "Payslip ID")),
    responses((status = 200, body = PayslipDocument), (status = 403), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn payslip_document(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let (line, enterprise_id) = fetch_visible_line(pool.get_ref(), &auth, path.into_inner()).await?;

    let pay_run = fetch_pay_run(pool.get_ref(), line.pay_run_id).await?;
    let enterprise = fetch_enterprise(pool.get_ref(), enterprise_id).await?;
    let employees = employees_by_id(pool.get_ref(), pay_run.id).await?;
    let payments = payments_of(pool.get_ref(), line.id).await?;

    payslip_documents(
        &enterprise,
        &pay_run,
        std::slice::from_ref(&line),
        &employees,
        &payments,
        Local::now().naive_local(),
    )
    .into_iter()
    .next()
    .map(|doc| HttpResponse::Ok().json(doc))
    .ok_or_else(|| AppError::not_found("Employee"))
}

/// Printable payslips of a whole pay run
#[utoipa::path(
    get,
    path = "/api/payruns/{id}/payslips/documents",
    params(("id", description = "Pay run ID")),
    responses((status = 200, body = [PayslipDocument]), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payslip"
)]
pub async fn pay_run_documents(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let pay_run = fetch_pay_run(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_enterprise(pay_run.enterprise_id)?;

    let (enterprise, employees) = futures::try_join!(
        fetch_enterprise(pool.get_ref(), pay_run.enterprise_id),
        employees_by_id(pool.get_ref(), pay_run.id),
    )?;

    let lines = sqlx::query_as::<_, PayslipLine>(&format!(
        "{PAYSLIP_LINE_SELECT} WHERE p.pay_run_id = ? ORDER BY e.full_name"
    ))
    .bind(pay_run.id)
    .fetch_all(pool.get_ref())
    .await?;

    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payslip_id IN \
         (SELECT id FROM payslips WHERE pay_run_id = ?) ORDER BY paid_at, id"
    ))
    .bind(pay_run.id)
    .fetch_all(pool.get_ref())
    .await?;

    let docs = payslip_documents(
        &enterprise,
        &pay_run,
        &lines,
        &employees,
        &payments,
        Local::now().naive_local(),
    );
    Ok(HttpResponse::Ok().json(docs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_payload_accepts_string_and_number_amounts() {
        let payload: UpdatePayslip = serde_json::from_value(json!({
            "deductions": "15000.50",
            "gross": 480000
        }))
        .unwrap();
        let edit = PayslipEdit::from(&payload);

        assert_eq!(edit.deductions, Some(Decimal::new(1500050, 2)));
        assert_eq!(edit.gross, Some(Decimal::from(480000)));
        assert_eq!(edit.days_worked, None);
    }
}
