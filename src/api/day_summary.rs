use std::collections::HashSet;

use crate::{
    api::{WRITE_BATCH, employee::fetch_employee, paging},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{attendance::AttendanceStatus, day_summary::DaySummary},
    utils::activity::{self, ActivityAction},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SUMMARY_COLUMNS: &str = "ds.id, ds.employee_id, ds.work_date, ds.hours_worked, ds.overtime_hours, \
                               ds.status, ds.is_locked, ds.locked_by, ds.locked_at, ds.updated_at";

#[derive(Deserialize, ToSchema)]
pub struct GenerateSummaries {
    pub enterprise_id: Option<u64>,
    #[schema(value_type = String, format = "date", example = "2026-06-01")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-06-30")]
    pub to: NaiveDate,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct GenerateOutcome {
    /// Summaries created or refreshed
    pub generated: u32,
    /// Days left alone because their summary is locked
    pub skipped_locked: u32,
    /// Unlocked summaries whose attendance was rejected or deleted
    pub removed: u32,
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub enterprise_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub is_locked: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct DaySummaryListResponse {
    pub data: Vec<DaySummary>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// An attendance record as it feeds a day summary.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceDay {
    employee_id: u64,
    work_date: NaiveDate,
    hours_worked: Decimal,
    overtime_hours: Decimal,
    #[sqlx(try_from = "String")]
    status: AttendanceStatus,
}

/// A summary already stored in the generated range.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredSummary {
    id: u64,
    employee_id: u64,
    work_date: NaiveDate,
    is_locked: bool,
}

#[derive(Debug)]
struct GenerationPlan {
    upserts: Vec<SourceDay>,
    stale: Vec<u64>,
    skipped_locked: u32,
}

/// Locked summaries are never touched. Unlocked ones without a backing
/// attendance record are stale.
fn plan_generation(days: Vec<SourceDay>, stored: &[StoredSummary]) -> GenerationPlan {
    let locked: HashSet<(u64, NaiveDate)> = stored
        .iter()
        .filter(|s| s.is_locked)
        .map(|s| (s.employee_id, s.work_date))
        .collect();
    let sourced: HashSet<(u64, NaiveDate)> =
        days.iter().map(|d| (d.employee_id, d.work_date)).collect();

    let (skipped, upserts): (Vec<_>, Vec<_>) = days
        .into_iter()
        .partition(|d| locked.contains(&(d.employee_id, d.work_date)));
    let stale = stored
        .iter()
        .filter(|s| !s.is_locked && !sourced.contains(&(s.employee_id, s.work_date)))
        .map(|s| s.id)
        .collect();

    GenerationPlan {
        upserts,
        stale,
        skipped_locked: skipped.len() as u32,
    }
}

async fn fetch_summary(pool: &MySqlPool, id: u64) -> AppResult<DaySummary> {
    sqlx::query_as::<_, DaySummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM day_summaries ds WHERE ds.id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Day summary"))
}

/// Build or refresh day summaries from attendance; locked days are kept
#[utoipa::path(
    post,
    path = "/api/day-summaries/generate",
    request_body = GenerateSummaries,
    responses((status = 200, body = GenerateOutcome), (status = 400, description = "Invalid range")),
    security(("bearer_auth" = [])),
    tag = "DaySummary"
)]
pub async fn generate_summaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GenerateSummaries>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    if payload.from > payload.to {
        return Err(AppError::Validation("from must not be after to".into()));
    }
    let scope = auth.scope(payload.enterprise_id)?;

    let mut tx = pool.begin().await?;

    let days = sqlx::query_as::<_, SourceDay>(
        r#"
        SELECT a.employee_id, a.work_date, a.hours_worked, a.overtime_hours, a.status
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        WHERE a.work_date BETWEEN ? AND ?
          AND a.approval_status <> 'REJECTED'
          AND (? IS NULL OR e.enterprise_id = ?)
        "#,
    )
    .bind(payload.from)
    .bind(payload.to)
    .bind(scope)
    .bind(scope)
    .fetch_all(&mut *tx)
    .await?;

    let stored = sqlx::query_as::<_, StoredSummary>(
        r#"
        SELECT ds.id, ds.employee_id, ds.work_date, ds.is_locked
        FROM day_summaries ds
        JOIN employees e ON e.id = ds.employee_id
        WHERE ds.work_date BETWEEN ? AND ?
          AND (? IS NULL OR e.enterprise_id = ?)
        FOR UPDATE
        "#,
    )
    .bind(payload.from)
    .bind(payload.to)
    .bind(scope)
    .bind(scope)
    .fetch_all(&mut *tx)
    .await?;

    let plan = plan_generation(days, &stored);

    for batch in plan.stale.chunks(WRITE_BATCH) {
        let mut qb =
            QueryBuilder::<MySql>::new("DELETE FROM day_summaries WHERE is_locked = FALSE AND id IN (");
        let mut separated = qb.separated(", ");
        for id in batch {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        qb.build().execute(&mut *tx).await?;
    }

    for batch in plan.upserts.chunks(WRITE_BATCH) {
        let mut qb = QueryBuilder::<MySql>::new(
            "INSERT INTO day_summaries (employee_id, work_date, hours_worked, overtime_hours, status) ",
        );
        qb.push_values(batch, |mut row, day| {
            row.push_bind(day.employee_id)
                .push_bind(day.work_date)
                .push_bind(day.hours_worked)
                .push_bind(day.overtime_hours)
                .push_bind(day.status.as_ref());
        });
        qb.push(
            " ON DUPLICATE KEY UPDATE \
             hours_worked = IF(is_locked, hours_worked, VALUES(hours_worked)), \
             overtime_hours = IF(is_locked, overtime_hours, VALUES(overtime_hours)), \
             status = IF(is_locked, status, VALUES(status))",
        );
        qb.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    let outcome = GenerateOutcome {
        generated: plan.upserts.len() as u32,
        skipped_locked: plan.skipped_locked,
        removed: plan.stale.len() as u32,
    };
    info!(
        from = %payload.from,
        to = %payload.to,
        generated = outcome.generated,
        skipped = outcome.skipped_locked,
        removed = outcome.removed,
        "Day summaries generated"
    );

    Ok(HttpResponse::Ok().json(outcome))
}

async fn set_lock(auth: &AuthUser, pool: &MySqlPool, id: u64, lock: bool) -> AppResult<DaySummary> {
    auth.require_admin()?;

    let summary = fetch_summary(pool, id).await?;
    let employee = fetch_employee(pool, summary.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;

    if summary.is_locked == lock {
        return Err(AppError::BusinessRule(format!(
            "Day summary is already {}",
            if lock { "locked" } else { "unlocked" }
        )));
    }

    if lock {
        sqlx::query(
            "UPDATE day_summaries SET is_locked = TRUE, locked_by = ?, locked_at = NOW() WHERE id = ?",
        )
        .bind(auth.user_id)
        .bind(id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "UPDATE day_summaries SET is_locked = FALSE, locked_by = NULL, locked_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(pool)
        .await?;
    }

    activity::record(
        pool,
        auth,
        Some(employee.enterprise_id),
        if lock { ActivityAction::DayLocked } else { ActivityAction::DayUnlocked },
        format!(
            "Day {} of {} {}",
            summary.work_date,
            employee.full_name,
            if lock { "locked" } else { "unlocked" }
        ),
    )
    .await;

    fetch_summary(pool, id).await
}

/// Freeze a day: its attendance can no longer be written
#[utoipa::path(
    post,
    path = "/api/day-summaries/{id}/lock",
    params(("id", description = "Day summary ID")),
    responses((status = 200, body = DaySummary), (status = 400, description = "Already locked"), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "DaySummary"
)]
pub async fn lock_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let summary = set_lock(&auth, pool.get_ref(), path.into_inner(), true).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    post,
    path = "/api/day-summaries/{id}/unlock",
    params(("id", description = "Day summary ID")),
    responses((status = 200, body = DaySummary), (status = 400, description = "Not locked"), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "DaySummary"
)]
pub async fn unlock_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let summary = set_lock(&auth, pool.get_ref(), path.into_inner(), false).await?;
    Ok(HttpResponse::Ok().json(summary))
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, enterprise_id: Option<u64>, query: &SummaryQuery) {
    qb.push(" FROM day_summaries ds JOIN employees e ON e.id = ds.employee_id WHERE 1 = 1");

    if let Some(enterprise_id) = enterprise_id {
        qb.push(" AND e.enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(employee_id) = query.employee_id {
        qb.push(" AND ds.employee_id = ").push_bind(employee_id);
    }
    if let Some(from) = query.from {
        qb.push(" AND ds.work_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND ds.work_date <= ").push_bind(to);
    }
    if let Some(is_locked) = query.is_locked {
        qb.push(" AND ds.is_locked = ").push_bind(is_locked);
    }
}

#[utoipa::path(
    get,
    path = "/api/day-summaries",
    params(SummaryQuery),
    responses((status = 200, body = DaySummaryListResponse)),
    security(("bearer_auth" = [])),
    tag = "DaySummary"
)]
pub async fn list_summaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> AppResult<HttpResponse> {
    auth.require_staff()?;
    let scope = auth.scope(query.enterprise_id)?;
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*)");
    push_filters(&mut count_qb, scope, &query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data_qb = QueryBuilder::<MySql>::new(format!("SELECT {SUMMARY_COLUMNS}"));
    push_filters(&mut data_qb, scope, &query);
    data_qb
        .push(" ORDER BY ds.work_date DESC, ds.employee_id LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);

    let data = data_qb.build_query_as::<DaySummary>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(DaySummaryListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(employee_id: u64, d: u32) -> SourceDay {
        SourceDay {
            employee_id,
            work_date: NaiveDate::from_ymd_opt(2026, 6, d).unwrap(),
            hours_worked: dec!(8),
            overtime_hours: dec!(0),
            status: AttendanceStatus::Present,
        }
    }

    fn stored(id: u64, employee_id: u64, d: u32, is_locked: bool) -> StoredSummary {
        StoredSummary {
            id,
            employee_id,
            work_date: NaiveDate::from_ymd_opt(2026, 6, d).unwrap(),
            is_locked,
        }
    }

    #[test]
    fn test_locked_days_are_skipped() {
        let plan = plan_generation(
            vec![day(1, 1), day(1, 2), day(2, 2)],
            &[stored(10, 1, 2, true)],
        );

        assert_eq!(plan.skipped_locked, 1);
        assert_eq!(plan.upserts.len(), 2);
        assert!(plan.upserts.iter().all(|d| !(d.employee_id == 1 && d.work_date.to_string() == "2026-06-02")));
        assert!(plan.stale.is_empty());
    }

    #[test]
    fn test_nothing_stored() {
        let plan = plan_generation(vec![day(1, 1)], &[]);
        assert_eq!((plan.upserts.len(), plan.skipped_locked, plan.stale.len()), (1, 0, 0));
    }

    #[test]
    fn test_summaries_without_attendance_are_removed() {
        // day 3 of employee 1 was rejected, day 4 of employee 2 deleted; day 5 is locked
        let plan = plan_generation(
            vec![day(1, 1)],
            &[
                stored(10, 1, 1, false),
                stored(11, 1, 3, false),
                stored(12, 2, 4, false),
                stored(13, 2, 5, true),
            ],
        );

        assert_eq!(plan.upserts.len(), 1);
        assert_eq!(plan.stale, vec![11, 12]);
        assert_eq!(plan.skipped_locked, 0);
    }
}
