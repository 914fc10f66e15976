use crate::{
    api::{
        employee::fetch_employee,
        enterprise::fetch_enterprise,
        paging,
        pay_run::fetch_pay_run,
        payslip::{fetch_line, lock_payslip, paid_total, store_status},
    },
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::payment::{Payment, PaymentMethod},
    payroll::{
        documents::{PaymentReceipt, payment_receipt},
        reconcile::{self, Settlement},
    },
    utils::activity::{self, ActivityAction},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const PAYMENT_COLUMNS: &str = "id, payslip_id, amount, method, reference, paid_at, created_by";

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreatePayment {
    pub payslip_id: u64,
    #[schema(value_type = String, example = "200000")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(max = 191))]
    #[schema(example = "OM-2026-06-0042")]
    pub reference: Option<String>,
    /// Defaults to now
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdatePayment {
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 191))]
    pub reference: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct PaymentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub enterprise_id: Option<u64>,
    pub pay_run_id: Option<u64>,
    pub payslip_id: Option<u64>,
    /// Inclusive, on the payment date
    pub from: Option<NaiveDate>,
    /// Inclusive, on the payment date
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentListResponse {
    pub data: Vec<Payment>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// A stored payment and where its payslip stands afterwards.
#[derive(Serialize, ToSchema)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub payslip: Settlement,
}

async fn fetch_payment(pool: &MySqlPool, id: u64) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Payment"))
}

async fn lock_payment(tx: &mut Transaction<'_, MySql>, id: u64) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found("Payment"))
}

async fn payment_enterprise(pool: &MySqlPool, payslip_id: u64) -> AppResult<u64> {
    sqlx::query_scalar::<_, u64>(
        r#"
        SELECT r.enterprise_id
        FROM payslips p
        JOIN pay_runs r ON r.id = p.pay_run_id
        WHERE p.id = ?
        "#,
    )
    .bind(payslip_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Payslip"))
}

/// Record a payment against a payslip
#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = CreatePayment,
    responses(
        (status = 201, body = PaymentOutcome),
        (status = 400, description = "Non-positive amount, payslip already paid or amount above the remaining balance"),
        (status = 404, description = "Payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
#[instrument(
    name = "payment_create",
    skip_all,
    fields(user_id = auth.user_id, payslip_id = payload.payslip_id)
)]
pub async fn create_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayment>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    payload.validate()?;

    let mut tx = pool.begin().await?;
    let payslip = lock_payslip(&mut tx, payload.payslip_id).await?;
    auth.ensure_enterprise(payslip.enterprise_id)?;

    let paid_so_far = paid_total(&mut tx, payslip.id, None).await?;
    let settlement = reconcile::plan_payment(payslip.net, paid_so_far, payload.amount)?;

    let payment_id = sqlx::query(
        r#"
        INSERT INTO payments (payslip_id, amount, method, reference, paid_at, created_by)
        VALUES (?, ?, ?, ?, COALESCE(?, CURRENT_TIMESTAMP), ?)
        "#,
    )
    .bind(payslip.id)
    .bind(payload.amount)
    .bind(payload.method.as_ref())
    .bind(&payload.reference)
    .bind(payload.paid_at)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    store_status(&mut tx, payslip.id, settlement.status).await?;
    tx.commit().await?;

    info!(
        payment_id,
        payslip_id = payslip.id,
        amount = %payload.amount,
        status = %settlement.status,
        "Payment recorded"
    );
    activity::record(
        pool.get_ref(),
        &auth,
        Some(payslip.enterprise_id),
        ActivityAction::PaymentRecorded,
        format!(
            "Payment of {} by {} on payslip #{}",
            payload.amount, payload.method, payslip.id
        ),
    )
    .await;

    let payment = fetch_payment(pool.get_ref(), payment_id).await?;
    Ok(HttpResponse::Created().json(PaymentOutcome {
        payment,
        payslip: settlement,
    }))
}

/// Change the amount, method or reference of a payment
#[utoipa::path(
    put,
    path = "/api/payments/{id}",
    params(("id", description = "Payment ID")),
    request_body = UpdatePayment,
    responses(
        (status = 200, body = PaymentOutcome),
        (status = 400, description = "Amount rejected"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
#[instrument(name = "payment_update", skip_all, fields(user_id = auth.user_id, payment_id = *path))]
pub async fn update_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayment>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    payload.validate()?;
    let id = path.into_inner();

    let payslip_id = fetch_payment(pool.get_ref(), id).await?.payslip_id;

    let mut tx = pool.begin().await?;
    let payslip = lock_payslip(&mut tx, payslip_id).await?;
    auth.ensure_enterprise(payslip.enterprise_id)?;
    let current = lock_payment(&mut tx, id).await?;

    let amount = payload.amount.unwrap_or(current.amount);
    let paid_by_others = paid_total(&mut tx, payslip.id, Some(id)).await?;
    let settlement = reconcile::plan_payment_update(payslip.net, paid_by_others, amount)?;

    sqlx::query("UPDATE payments SET amount = ?, method = ?, reference = ? WHERE id = ?")
        .bind(amount)
        .bind(payload.method.unwrap_or(current.method).as_ref())
        .bind(payload.reference.as_ref().or(current.reference.as_ref()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    store_status(&mut tx, payslip.id, settlement.status).await?;
    tx.commit().await?;

    info!(payment_id = id, amount = %amount, status = %settlement.status, "Payment updated");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(payslip.enterprise_id),
        ActivityAction::PaymentUpdated,
        format!(
            "Payment #{} on payslip #{} changed from {} to {}",
            id, payslip.id, current.amount, amount
        ),
    )
    .await;

    let payment = fetch_payment(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(PaymentOutcome {
        payment,
        payslip: settlement,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/payments/{id}",
    params(("id", description = "Payment ID")),
    responses((status = 200, body = Settlement), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
#[instrument(name = "payment_delete", skip_all, fields(user_id = auth.user_id, payment_id = *path))]
pub async fn delete_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let id = path.into_inner();

    let payslip_id = fetch_payment(pool.get_ref(), id).await?.payslip_id;

    let mut tx = pool.begin().await?;
    let payslip = lock_payslip(&mut tx, payslip_id).await?;
    auth.ensure_enterprise(payslip.enterprise_id)?;
    let removed = lock_payment(&mut tx, id).await?;

    let paid_by_others = paid_total(&mut tx, payslip.id, Some(id)).await?;
    let settlement = reconcile::after_removal(payslip.net, paid_by_others);

    sqlx::query("DELETE FROM payments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    store_status(&mut tx, payslip.id, settlement.status).await?;
    tx.commit().await?;

    info!(payment_id = id, payslip_id, status = %settlement.status, "Payment deleted");
    activity::record(
        pool.get_ref(),
        &auth,
        Some(payslip.enterprise_id),
        ActivityAction::PaymentDeleted,
        format!("Payment of {} on payslip #{} removed", removed.amount, payslip.id),
    )
    .await;

    Ok(HttpResponse::Ok().json(settlement))
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, enterprise_id: Option<u64>, query: &PaymentQuery) {
    qb.push(
        " FROM payments pm \
         JOIN payslips p ON p.id = pm.payslip_id \
         JOIN pay_runs r ON r.id = p.pay_run_id \
         WHERE 1 = 1",
    );

    if let Some(enterprise_id) = enterprise_id {
        qb.push(" AND r.enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(pay_run_id) = query.pay_run_id {
        qb.push(" AND p.pay_run_id = ").push_bind(pay_run_id);
    }
    if let Some(payslip_id) = query.payslip_id {
        qb.push(" AND pm.payslip_id = ").push_bind(payslip_id);
    }
    if let Some(from) = query.from {
        qb.push(" AND DATE(pm.paid_at) >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND DATE(pm.paid_at) <= ").push_bind(to);
    }
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(PaymentQuery),
    responses((status = 200, body = PaymentListResponse)),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn list_payments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PaymentQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*)");
    push_filters(&mut count_qb, scope, &query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data_qb = QueryBuilder::<MySql>::new(
        "SELECT pm.id, pm.payslip_id, pm.amount, pm.method, pm.reference, pm.paid_at, pm.created_by",
    );
    push_filters(&mut data_qb, scope, &query);
    data_qb
        .push(" ORDER BY pm.paid_at DESC, pm.id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    debug!(sql = %data_qb.sql(), "Listing payments");

    let data = data_qb.build_query_as::<Payment>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(PaymentListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id", description = "Payment ID")),
    responses((status = 200, body = Payment), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn get_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let payment = fetch_payment(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_enterprise(payment_enterprise(pool.get_ref(), payment.payslip_id).await?)?;

    Ok(HttpResponse::Ok().json(payment))
}

/// Printable receipt for one payment
#[utoipa::path(
    get,
    path = "/api/payments/{id}/receipt",
    params(("id", description = "Payment ID")),
    responses((status = 200, body = PaymentReceipt), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn payment_receipt_document(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let payment = fetch_payment(pool.get_ref(), path.into_inner()).await?;

    let line = fetch_line(pool.get_ref(), payment.payslip_id).await?;
    let pay_run = fetch_pay_run(pool.get_ref(), line.pay_run_id).await?;
    auth.ensure_enterprise(pay_run.enterprise_id)?;

    let (enterprise, employee) = futures::try_join!(
        fetch_enterprise(pool.get_ref(), pay_run.enterprise_id),
        fetch_employee(pool.get_ref(), line.employee_id),
    )?;

    let receipt = payment_receipt(
        &enterprise,
        &pay_run,
        &employee,
        &line,
        payment,
        Local::now().naive_local(),
    );
    Ok(HttpResponse::Ok().json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_payload() {
        let payload: CreatePayment = serde_json::from_value(json!({
            "payslip_id": 17,
            "amount": "200000",
            "method": "MOBILE_MONEY",
            "reference": "OM-42"
        }))
        .unwrap();

        assert_eq!(payload.amount, dec!(200000));
        assert_eq!(payload.method, PaymentMethod::MobileMoney);
        assert!(payload.paid_at.is_none());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let parsed = serde_json::from_value::<CreatePayment>(json!({
            "payslip_id": 17,
            "amount": "1",
            "method": "CHEQUE"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_reference_length_checked() {
        let payload = UpdatePayment {
            amount: None,
            method: None,
            reference: Some("x".repeat(300)),
        };
        assert!(payload.validate().is_err());
    }
}
