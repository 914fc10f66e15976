use std::collections::HashMap;

use crate::{
    api::{employee::fetch_employee, paging},
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        attendance::{ApprovalStatus, Attendance, AttendanceAudit, AttendanceStatus},
        employee::Employee,
    },
    utils::{
        activity::{self, ActivityAction},
        timesheet::{self, Clock, MonthlyLine, ReportRow, Review, WorkedHours},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, Months, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.employee_id, a.work_date, a.check_in, a.check_out, a.break_start,
           a.break_end, a.break_seconds, a.hours_worked, a.overtime_hours, a.status,
           a.approval_status, a.notes, a.created_at
    FROM attendance a
    JOIN employees e ON e.id = a.employee_id
"#;

#[derive(Deserialize, IntoParams)]
pub struct ClockQuery {
    /// Required for admins acting on behalf of an employee
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAttendance {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-06-15")]
    pub work_date: NaiveDate,
    #[schema(value_type = Option<String>, example = "08:05:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:00:00")]
    pub check_out: Option<NaiveTime>,
    #[serde(default)]
    #[validate(range(max = 1440))]
    pub break_minutes: u32,
    /// Derived from check-in when omitted
    pub status: Option<AttendanceStatus>,
    #[validate(length(max = 255))]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct BulkCreateAttendance {
    #[validate(length(min = 1, max = 500), nested)]
    pub records: Vec<CreateAttendance>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAttendance {
    #[schema(value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    #[validate(range(max = 1440))]
    pub break_minutes: Option<u32>,
    pub status: Option<AttendanceStatus>,
    #[validate(length(max = 255))]
    pub notes: Option<String>,
    /// Why the record is being corrected
    #[validate(length(min = 3, max = 500))]
    pub justification: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ReviewAttendance {
    #[validate(length(max = 500))]
    pub justification: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub enterprise_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub approval_status: Option<ApprovalStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct ReportQuery {
    #[param(example = 2026)]
    pub year: i32,
    #[param(example = 6)]
    pub month: u32,
    pub enterprise_id: Option<u64>,
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    pub lines: Vec<MonthlyLine>,
}

/// Local date and time, truncated to the second.
fn now_local() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());
    (now.date(), time)
}

fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("Invalid month {year}-{month}")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::Validation(format!("Invalid month {year}-{month}")))?;
    Ok((first, last))
}

/// Clock, hours and status of a manually entered record.
fn manual_entry(
    input: &CreateAttendance,
    config: &Config,
) -> AppResult<(Clock, WorkedHours, AttendanceStatus)> {
    if input.check_out.is_some() && input.check_in.is_none() {
        return Err(AppError::Validation("check_out requires check_in".into()));
    }

    let clock = Clock {
        check_in: input.check_in,
        check_out: input.check_out,
        break_seconds: timesheet::break_seconds_from_minutes(input.break_minutes),
        ..Default::default()
    };
    let worked = timesheet::worked_hours(&clock, config.standard_daily_hours)?;
    let status = input.status.unwrap_or(match input.check_in {
        Some(t) => timesheet::arrival_status(t, config.workday_start, config.late_grace_minutes),
        None => AttendanceStatus::Absent,
    });

    Ok((clock, worked, status))
}

/// Clock, hours and status after a correction is applied.
fn corrected_entry(
    current: &Attendance,
    edit: &UpdateAttendance,
    standard_hours: rust_decimal::Decimal,
) -> AppResult<(Clock, WorkedHours, AttendanceStatus)> {
    let clock = Clock {
        check_in: edit.check_in.or(current.check_in),
        check_out: edit.check_out.or(current.check_out),
        break_seconds: edit
            .break_minutes
            .map_or(current.break_seconds, timesheet::break_seconds_from_minutes),
        ..Clock::from(current)
    };
    if clock.check_out.is_some() && clock.check_in.is_none() {
        return Err(AppError::Validation("check_out requires check_in".into()));
    }

    let worked = timesheet::worked_hours(&clock, standard_hours)?;
    Ok((clock, worked, edit.status.unwrap_or(current.status)))
}

/// EMPLOYEE callers act on themselves; admins name the employee.
async fn resolve_employee(
    pool: &MySqlPool,
    auth: &AuthUser,
    requested: Option<u64>,
) -> AppResult<Employee> {
    let employee_id = if auth.is_employee() {
        let own = auth
            .employee_id
            .ok_or_else(|| AppError::Forbidden("No employee record linked to this account".into()))?;
        if requested.is_some_and(|id| id != own) {
            return Err(AppError::Forbidden(
                "Employees can only clock for themselves".into(),
            ));
        }
        own
    } else {
        auth.require_admin()?;
        requested.ok_or_else(|| AppError::Validation("employee_id is required".into()))?
    };

    let employee = fetch_employee(pool, employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    if !employee.is_active {
        return Err(AppError::BusinessRule("Employee is inactive".into()));
    }
    Ok(employee)
}

async fn ensure_day_unlocked(
    conn: &mut MySqlConnection,
    employee_id: u64,
    work_date: NaiveDate,
) -> AppResult<()> {
    let locked: Option<bool> = sqlx::query_scalar(
        "SELECT is_locked FROM day_summaries WHERE employee_id = ? AND work_date = ?",
    )
    .bind(employee_id)
    .bind(work_date)
    .fetch_optional(&mut *conn)
    .await?;

    if locked == Some(true) {
        return Err(AppError::BusinessRule(format!(
            "Day {work_date} is locked for this employee"
        )));
    }
    Ok(())
}

/// A rejected or deleted record no longer backs its day summary.
async fn drop_unlocked_summary(
    conn: &mut MySqlConnection,
    employee_id: u64,
    work_date: NaiveDate,
) -> AppResult<()> {
    sqlx::query(
        "DELETE FROM day_summaries WHERE employee_id = ? AND work_date = ? AND is_locked = FALSE",
    )
    .bind(employee_id)
    .bind(work_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_attendance(pool: &MySqlPool, id: u64) -> AppResult<Attendance> {
    sqlx::query_as::<_, Attendance>(&format!("{ATTENDANCE_SELECT} WHERE a.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance"))
}

async fn lock_attendance(conn: &mut MySqlConnection, id: u64) -> AppResult<Attendance> {
    sqlx::query_as::<_, Attendance>(&format!("{ATTENDANCE_SELECT} WHERE a.id = ? FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance"))
}

async fn lock_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    work_date: NaiveDate,
) -> AppResult<Option<Attendance>> {
    let record = sqlx::query_as::<_, Attendance>(&format!(
        "{ATTENDANCE_SELECT} WHERE a.employee_id = ? AND a.work_date = ? FOR UPDATE"
    ))
    .bind(employee_id)
    .bind(work_date)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

async fn store_clock(
    conn: &mut MySqlConnection,
    id: u64,
    clock: &Clock,
    worked: WorkedHours,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE attendance
        SET check_in = ?, check_out = ?, break_start = ?, break_end = ?, break_seconds = ?,
            hours_worked = ?, overtime_hours = ?
        WHERE id = ?
        "#,
    )
    .bind(clock.check_in)
    .bind(clock.check_out)
    .bind(clock.break_start)
    .bind(clock.break_end)
    .bind(clock.break_seconds)
    .bind(worked.hours)
    .bind(worked.overtime)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Appends to the audit trail; entries are never updated or deleted.
async fn write_audit(
    conn: &mut MySqlConnection,
    attendance_id: u64,
    action: &str,
    old: Option<&Attendance>,
    new: Option<&Attendance>,
    justification: Option<&str>,
    performed_by: u64,
) -> AppResult<()> {
    let old_value = old.map(serde_json::to_value).transpose()?;
    let new_value = new.map(serde_json::to_value).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO attendance_audit
        (attendance_id, action, old_value, new_value, justification, performed_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attendance_id)
    .bind(action)
    .bind(old_value)
    .bind(new_value)
    .bind(justification)
    .bind(performed_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Check in for today
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    params(ClockQuery),
    responses(
        (status = 201, description = "Checked in", body = Attendance),
        (status = 400, description = "Already checked in today or day locked"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ClockQuery>,
) -> AppResult<HttpResponse> {
    let employee = resolve_employee(pool.get_ref(), &auth, query.employee_id).await?;
    let (today, now) = now_local();

    let mut tx = pool.begin().await?;
    ensure_day_unlocked(&mut tx, employee.id, today).await?;
    if lock_day(&mut tx, employee.id, today).await?.is_some() {
        return Err(AppError::BusinessRule("Already checked in today".into()));
    }

    let status = timesheet::arrival_status(now, config.workday_start, config.late_grace_minutes);
    let id = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, work_date, check_in, status, approval_status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee.id)
    .bind(today)
    .bind(now)
    .bind(status.as_ref())
    .bind(ApprovalStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::BusinessRule("Already checked in today".into()),
        other => other,
    })?
    .last_insert_id();
    tx.commit().await?;

    info!(employee_id = employee.id, %status, "Checked in");
    Ok(HttpResponse::Created().json(fetch_attendance(pool.get_ref(), id).await?))
}

#[derive(Debug, Clone, Copy)]
enum ClockAction {
    BreakStart,
    BreakEnd,
    CheckOut,
}

async fn clock_action(
    auth: &AuthUser,
    pool: &MySqlPool,
    config: &Config,
    requested: Option<u64>,
    action: ClockAction,
) -> AppResult<Attendance> {
    let employee = resolve_employee(pool, auth, requested).await?;
    let (today, now) = now_local();

    let mut tx = pool.begin().await?;
    ensure_day_unlocked(&mut tx, employee.id, today).await?;
    let record = lock_day(&mut tx, employee.id, today)
        .await?
        .ok_or_else(|| AppError::BusinessRule("Not checked in today".into()))?;

    let clock = Clock::from(&record);
    let kept = WorkedHours {
        hours: record.hours_worked,
        overtime: record.overtime_hours,
    };
    let (clock, worked) = match action {
        ClockAction::BreakStart => (timesheet::start_break(&clock, now)?, kept),
        ClockAction::BreakEnd => (timesheet::end_break(&clock, now)?, kept),
        ClockAction::CheckOut => {
            let closed = timesheet::check_out(&clock, now)?;
            (closed, timesheet::worked_hours(&closed, config.standard_daily_hours)?)
        }
    };

    store_clock(&mut tx, record.id, &clock, worked).await?;
    tx.commit().await?;

    debug!(employee_id = employee.id, ?action, "Clock updated");
    fetch_attendance(pool, record.id).await
}

#[utoipa::path(
    post,
    path = "/api/attendance/break-start",
    params(ClockQuery),
    responses((status = 200, body = Attendance), (status = 400, description = "Not on shift or break already open")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn break_start(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ClockQuery>,
) -> AppResult<HttpResponse> {
    let record = clock_action(&auth, pool.get_ref(), &config, query.employee_id, ClockAction::BreakStart).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/break-end",
    params(ClockQuery),
    responses((status = 200, body = Attendance), (status = 400, description = "No break in progress")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn break_end(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ClockQuery>,
) -> AppResult<HttpResponse> {
    let record = clock_action(&auth, pool.get_ref(), &config, query.employee_id, ClockAction::BreakEnd).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Check out, closing any open break and computing hours
#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    params(ClockQuery),
    responses(
        (status = 200, body = Attendance),
        (status = 400, description = "Not checked in or already checked out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ClockQuery>,
) -> AppResult<HttpResponse> {
    let record = clock_action(&auth, pool.get_ref(), &config, query.employee_id, ClockAction::CheckOut).await?;
    info!(employee_id = record.employee_id, hours = %record.hours_worked, "Checked out");
    Ok(HttpResponse::Ok().json(record))
}

async fn insert_manual(
    conn: &mut MySqlConnection,
    auth: &AuthUser,
    config: &Config,
    input: &CreateAttendance,
) -> AppResult<u64> {
    ensure_day_unlocked(conn, input.employee_id, input.work_date).await?;
    let (clock, worked, status) = manual_entry(input, config)?;

    let id = sqlx::query(
        r#"
        INSERT INTO attendance
        (employee_id, work_date, check_in, check_out, break_seconds, hours_worked,
         overtime_hours, status, approval_status, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.employee_id)
    .bind(input.work_date)
    .bind(clock.check_in)
    .bind(clock.check_out)
    .bind(clock.break_seconds)
    .bind(worked.hours)
    .bind(worked.overtime)
    .bind(status.as_ref())
    .bind(ApprovalStatus::Pending.as_ref())
    .bind(&input.notes)
    .execute(&mut *conn)
    .await?
    .last_insert_id();

    let created = lock_attendance(conn, id).await?;
    write_audit(conn, id, "CREATED", None, Some(&created), None, auth.user_id).await?;
    Ok(id)
}

/// Record attendance for any date
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CreateAttendance,
    responses(
        (status = 201, body = Attendance),
        (status = 400, description = "Invalid times or day locked"),
        (status = 409, description = "A record already exists for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let employee = fetch_employee(pool.get_ref(), payload.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;

    let mut tx = pool.begin().await?;
    let id = insert_manual(&mut tx, &auth, &config, &payload).await?;
    tx.commit().await?;

    info!(attendance_id = id, employee_id = employee.id, "Attendance recorded");
    Ok(HttpResponse::Created().json(fetch_attendance(pool.get_ref(), id).await?))
}

/// Record many days at once; nothing is stored if any record fails
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = BulkCreateAttendance,
    responses(
        (status = 201, body = [Attendance]),
        (status = 400),
        (status = 409, description = "A record already exists for one of the days")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn bulk_create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<BulkCreateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let mut enterprises: HashMap<u64, u64> = HashMap::new();
    for record in &payload.records {
        if !enterprises.contains_key(&record.employee_id) {
            let employee = fetch_employee(pool.get_ref(), record.employee_id).await?;
            auth.ensure_enterprise(employee.enterprise_id)?;
            enterprises.insert(employee.id, employee.enterprise_id);
        }
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(payload.records.len());
    for record in &payload.records {
        ids.push(insert_manual(&mut tx, &auth, &config, record).await?);
    }
    tx.commit().await?;

    info!(count = ids.len(), "Attendance bulk recorded");

    let mut qb = QueryBuilder::<MySql>::new(format!("{ATTENDANCE_SELECT} WHERE a.id IN ("));
    let mut separated = qb.separated(", ");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY a.work_date, a.employee_id");
    let created = qb.build_query_as::<Attendance>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Created().json(created))
}

/// Correct a record; the change is audited and the record goes back to review
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(("id", description = "Attendance ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, body = Attendance),
        (status = 400, description = "Invalid times, missing justification or day locked"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let current = lock_attendance(&mut tx, id).await?;
    let employee = fetch_employee(pool.get_ref(), current.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    ensure_day_unlocked(&mut tx, current.employee_id, current.work_date).await?;

    let (clock, worked, status) = corrected_entry(&current, &payload, config.standard_daily_hours)?;

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_in = ?, check_out = ?, break_seconds = ?, hours_worked = ?,
            overtime_hours = ?, status = ?, notes = ?, approval_status = ?
        WHERE id = ?
        "#,
    )
    .bind(clock.check_in)
    .bind(clock.check_out)
    .bind(clock.break_seconds)
    .bind(worked.hours)
    .bind(worked.overtime)
    .bind(status.as_ref())
    .bind(payload.notes.as_ref().or(current.notes.as_ref()))
    .bind(ApprovalStatus::Corrected.as_ref())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = lock_attendance(&mut tx, id).await?;
    write_audit(
        &mut tx,
        id,
        "CORRECTED",
        Some(&current),
        Some(&updated),
        Some(payload.justification.trim()),
        auth.user_id,
    )
    .await?;
    tx.commit().await?;

    info!(attendance_id = id, "Attendance corrected");
    Ok(HttpResponse::Ok().json(updated))
}

async fn apply_review(
    auth: &AuthUser,
    pool: &MySqlPool,
    id: u64,
    decision: Review,
    justification: Option<&str>,
) -> AppResult<Attendance> {
    auth.require_admin()?;

    let mut tx = pool.begin().await?;
    let current = lock_attendance(&mut tx, id).await?;
    let employee = fetch_employee(pool, current.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    ensure_day_unlocked(&mut tx, current.employee_id, current.work_date).await?;

    let next = timesheet::review(current.approval_status, decision)?;
    sqlx::query("UPDATE attendance SET approval_status = ? WHERE id = ?")
        .bind(next.as_ref())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if next == ApprovalStatus::Rejected {
        drop_unlocked_summary(&mut tx, current.employee_id, current.work_date).await?;
    }

    let reviewed = lock_attendance(&mut tx, id).await?;
    write_audit(
        &mut tx,
        id,
        next.as_ref(),
        Some(&current),
        Some(&reviewed),
        justification,
        auth.user_id,
    )
    .await?;
    tx.commit().await?;

    activity::record(
        pool,
        auth,
        Some(employee.enterprise_id),
        match decision {
            Review::Approve => ActivityAction::AttendanceApproved,
            Review::Reject => ActivityAction::AttendanceRejected,
        },
        format!(
            "Attendance of {} on {} {}",
            employee.full_name,
            current.work_date,
            next.as_ref().to_lowercase()
        ),
    )
    .await;

    Ok(reviewed)
}

#[utoipa::path(
    post,
    path = "/api/attendance/{id}/approve",
    params(("id", description = "Attendance ID")),
    request_body = ReviewAttendance,
    responses((status = 200, body = Attendance), (status = 400, description = "Already reviewed or day locked")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn approve_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<ReviewAttendance>>,
) -> AppResult<HttpResponse> {
    let justification = match &payload {
        Some(body) => {
            body.validate()?;
            body.justification.as_deref()
        }
        None => None,
    };
    let record = apply_review(&auth, pool.get_ref(), path.into_inner(), Review::Approve, justification).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Reject a record; a justification is mandatory
#[utoipa::path(
    post,
    path = "/api/attendance/{id}/reject",
    params(("id", description = "Attendance ID")),
    request_body = ReviewAttendance,
    responses((status = 200, body = Attendance), (status = 400, description = "Missing justification or already reviewed")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn reject_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewAttendance>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let justification = payload
        .justification
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .ok_or_else(|| AppError::Validation("justification is required to reject".into()))?;

    let record = apply_review(&auth, pool.get_ref(), path.into_inner(), Review::Reject, Some(justification)).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}/audit",
    params(("id", description = "Attendance ID")),
    responses((status = 200, body = [AttendanceAudit]), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_audit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let record = fetch_attendance(pool.get_ref(), path.into_inner()).await?;
    let employee = fetch_employee(pool.get_ref(), record.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;

    let trail = sqlx::query_as::<_, AttendanceAudit>(
        r#"
        SELECT id, attendance_id, action, old_value, new_value, justification, performed_by, created_at
        FROM attendance_audit
        WHERE attendance_id = ?
        ORDER BY id
        "#,
    )
    .bind(record.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(trail))
}

fn push_filters(
    qb: &mut QueryBuilder<'_, MySql>,
    enterprise_id: Option<u64>,
    employee_id: Option<u64>,
    query: &AttendanceQuery,
) {
    qb.push(" WHERE 1 = 1");

    if let Some(enterprise_id) = enterprise_id {
        qb.push(" AND e.enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(employee_id) = employee_id {
        qb.push(" AND a.employee_id = ").push_bind(employee_id);
    }
    if let Some(from) = query.from {
        qb.push(" AND a.work_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND a.work_date <= ").push_bind(to);
    }
    if let Some(status) = query.status {
        qb.push(" AND a.status = ").push_bind(status.as_ref().to_string());
    }
    if let Some(approval) = query.approval_status {
        qb.push(" AND a.approval_status = ").push_bind(approval.as_ref().to_string());
    }
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses((status = 200, body = AttendanceListResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
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
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut count_qb = QueryBuilder::<MySql>::new(
        "SELECT COUNT(*) FROM attendance a JOIN employees e ON e.id = a.employee_id",
    );
    push_filters(&mut count_qb, scope, employee_id, &query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data_qb = QueryBuilder::<MySql>::new(ATTENDANCE_SELECT);
    push_filters(&mut data_qb, scope, employee_id, &query);
    data_qb
        .push(" ORDER BY a.work_date DESC, a.id DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);

    let data = data_qb.build_query_as::<Attendance>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id", description = "Attendance ID")),
    responses((status = 200, body = Attendance), (status = 403), (status = 404)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let record = fetch_attendance(pool.get_ref(), path.into_inner()).await?;
    let employee = fetch_employee(pool.get_ref(), record.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    auth.ensure_employee(employee.id)?;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id", description = "Attendance ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 400, description = "Day locked"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let current = lock_attendance(&mut tx, id).await?;
    let employee = fetch_employee(pool.get_ref(), current.employee_id).await?;
    auth.ensure_enterprise(employee.enterprise_id)?;
    ensure_day_unlocked(&mut tx, current.employee_id, current.work_date).await?;

    sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    drop_unlocked_summary(&mut tx, current.employee_id, current.work_date).await?;
    tx.commit().await?;

    info!(attendance_id = id, employee_id = current.employee_id, "Attendance deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Per-employee attendance for one month; rejected records are left out
#[utoipa::path(
    get,
    path = "/api/attendance/report",
    params(ReportQuery),
    responses((status = 200, body = MonthlyReport), (status = 400, description = "Invalid month")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let scope = auth.scope(query.enterprise_id)?;
    let (first, last) = month_bounds(query.year, query.month)?;

    let mut qb = QueryBuilder::<MySql>::new(
        r#"
        SELECT a.employee_id, e.full_name, a.status, a.hours_worked, a.overtime_hours
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        WHERE a.approval_status <> 'REJECTED' AND a.work_date BETWEEN "#,
    );
    qb.push_bind(first).push(" AND ").push_bind(last);
    if let Some(enterprise_id) = scope {
        qb.push(" AND e.enterprise_id = ").push_bind(enterprise_id);
    }
    if let Some(employee_id) = query.employee_id {
        qb.push(" AND a.employee_id = ").push_bind(employee_id);
    }

    let rows = qb.build_query_as::<ReportRow>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(MonthlyReport {
        year: query.year,
        month: query.month,
        period_start: first,
        period_end: last,
        lines: timesheet::summarize_month(&rows),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn input(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> CreateAttendance {
        CreateAttendance {
            employee_id: 1,
            work_date: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            check_in,
            check_out,
            break_minutes: 60,
            status: None,
            notes: None,
        }
    }

    fn record() -> Attendance {
        Attendance {
            id: 5,
            employee_id: 1,
            work_date: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            check_in: Some(t(8, 0)),
            check_out: Some(t(16, 0)),
            break_start: None,
            break_end: None,
            break_seconds: 0,
            hours_worked: dec!(8),
            overtime_hours: dec!(0),
            status: AttendanceStatus::Present,
            approval_status: ApprovalStatus::Approved,
            notes: None,
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2026, 2).unwrap();
        assert_eq!(first.to_string(), "2026-02-01");
        assert_eq!(last.to_string(), "2026-02-28");

        let (_, last) = month_bounds(2026, 12).unwrap();
        assert_eq!(last.to_string(), "2026-12-31");

        assert!(month_bounds(2026, 13).is_err());
    }

    #[test]
    fn test_manual_entry_derives_status_and_hours() {
        let config = Config::for_tests();

        let (_, worked, status) = manual_entry(&input(Some(t(8, 30)), Some(t(17, 30))), &config).unwrap();
        assert_eq!(status, AttendanceStatus::Late);
        assert_eq!(worked.hours, dec!(8));

        let (_, worked, status) = manual_entry(&input(None, None), &config).unwrap();
        assert_eq!(status, AttendanceStatus::Absent);
        assert_eq!(worked, WorkedHours::ZERO);
    }

    #[test]
    fn test_manual_entry_keeps_explicit_status() {
        let mut sick = input(None, None);
        sick.status = Some(AttendanceStatus::Sick);
        let (_, _, status) = manual_entry(&sick, &Config::for_tests()).unwrap();
        assert_eq!(status, AttendanceStatus::Sick);
    }

    #[test]
    fn test_check_out_without_check_in_rejected() {
        let result = manual_entry(&input(None, Some(t(17, 0))), &Config::for_tests());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_correction_recomputes_hours() {
        let edit = UpdateAttendance {
            check_in: None,
            check_out: Some(t(18, 30)),
            break_minutes: Some(30),
            status: None,
            notes: None,
            justification: "Forgot to clock out".into(),
        };

        let (clock, worked, status) = corrected_entry(&record(), &edit, dec!(8)).unwrap();
        assert_eq!(clock.check_in, Some(t(8, 0)));
        assert_eq!(worked.hours, dec!(10));
        assert_eq!(worked.overtime, dec!(2));
        assert_eq!(status, AttendanceStatus::Present);
    }

    #[test]
    fn test_correction_needs_justification() {
        let edit = UpdateAttendance {
            check_in: None,
            check_out: None,
            break_minutes: None,
            status: Some(AttendanceStatus::Leave),
            notes: None,
            justification: "".into(),
        };
        assert!(edit.validate().is_err());
    }

    #[test]
    fn test_bulk_validates_each_record() {
        let mut long_break = input(Some(t(8, 0)), Some(t(17, 0)));
        long_break.break_minutes = 1441;
        let bulk = BulkCreateAttendance {
            records: vec![input(Some(t(8, 0)), Some(t(17, 0))), long_break],
        };
        assert!(bulk.validate().is_err());

        let empty = BulkCreateAttendance { records: vec![] };
        assert!(empty.validate().is_err());

        let ok = BulkCreateAttendance {
            records: vec![input(Some(t(8, 0)), Some(t(17, 0)))],
        };
        assert!(ok.validate().is_ok());
    }
}
