use std::collections::BTreeMap;

use chrono::{Duration, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::attendance::{ApprovalStatus, Attendance, AttendanceStatus};

/// The clock fields of one attendance record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub break_seconds: u32,
}

impl From<&Attendance> for Clock {
    fn from(a: &Attendance) -> Self {
        Self {
            check_in: a.check_in,
            check_out: a.check_out,
            break_start: a.break_start,
            break_end: a.break_end,
            break_seconds: a.break_seconds,
        }
    }
}

/// Hours and overtime, both rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkedHours {
    pub hours: Decimal,
    pub overtime: Decimal,
}

impl WorkedHours {
    pub const ZERO: WorkedHours = WorkedHours {
        hours: Decimal::ZERO,
        overtime: Decimal::ZERO,
    };
}

fn seconds_between(from: NaiveTime, to: NaiveTime) -> AppResult<i64> {
    let seconds = (to - from).num_seconds();
    if seconds < 0 {
        return Err(AppError::Validation(format!(
            "{to} is earlier than {from}"
        )));
    }
    Ok(seconds)
}

pub fn hours_from_seconds(seconds: i64) -> Decimal {
    (Decimal::from(seconds) / Decimal::from(3600))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Manual entries give breaks in whole minutes.
pub fn break_seconds_from_minutes(minutes: u32) -> u32 {
    minutes.saturating_mul(60)
}

/// Net hours of a closed record: `check_out - check_in - breaks`, floored at
/// zero; overtime is whatever exceeds `standard_hours`.
pub fn worked_hours(clock: &Clock, standard_hours: Decimal) -> AppResult<WorkedHours> {
    let (Some(check_in), Some(check_out)) = (clock.check_in, clock.check_out) else {
        return Ok(WorkedHours::ZERO);
    };

    let span = seconds_between(check_in, check_out)?;
    let net = (span - i64::from(clock.break_seconds)).max(0);
    let hours = hours_from_seconds(net);

    Ok(WorkedHours {
        hours,
        overtime: (hours - standard_hours).max(Decimal::ZERO),
    })
}

/// LATE once check-in passes the workday start plus the grace period.
pub fn arrival_status(check_in: NaiveTime, workday_start: NaiveTime, grace_minutes: i64) -> AttendanceStatus {
    let (deadline, wrapped) = workday_start.overflowing_add_signed(Duration::minutes(grace_minutes));
    if wrapped == 0 && check_in > deadline {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

fn ensure_on_shift(clock: &Clock) -> AppResult<()> {
    if clock.check_in.is_none() {
        return Err(AppError::BusinessRule("Not checked in today".into()));
    }
    if clock.check_out.is_some() {
        return Err(AppError::BusinessRule("Already checked out today".into()));
    }
    Ok(())
}

pub fn start_break(clock: &Clock, now: NaiveTime) -> AppResult<Clock> {
    ensure_on_shift(clock)?;
    if clock.break_start.is_some() {
        return Err(AppError::BusinessRule("A break is already in progress".into()));
    }

    Ok(Clock {
        break_start: Some(now),
        break_end: None,
        ..*clock
    })
}

pub fn end_break(clock: &Clock, now: NaiveTime) -> AppResult<Clock> {
    ensure_on_shift(clock)?;
    let Some(started) = clock.break_start else {
        return Err(AppError::BusinessRule("No break in progress".into()));
    };

    let elapsed = u32::try_from(seconds_between(started, now)?).unwrap_or(u32::MAX);
    Ok(Clock {
        break_start: None,
        break_end: Some(now),
        break_seconds: clock.break_seconds.saturating_add(elapsed),
        ..*clock
    })
}

/// Closes the shift, ending any open break at the same instant.
pub fn check_out(clock: &Clock, now: NaiveTime) -> AppResult<Clock> {
    ensure_on_shift(clock)?;
    let clock = if clock.break_start.is_some() {
        end_break(clock, now)?
    } else {
        *clock
    };

    if let Some(check_in) = clock.check_in {
        seconds_between(check_in, now)?;
    }

    Ok(Clock {
        check_out: Some(now),
        ..clock
    })
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Review {
    Approve,
    Reject,
}

/// PENDING and CORRECTED records can be approved or rejected; a decided
/// record has to be corrected before it is reviewed again.
pub fn review(current: ApprovalStatus, decision: Review) -> AppResult<ApprovalStatus> {
    match current {
        ApprovalStatus::Pending | ApprovalStatus::Corrected => Ok(match decision {
            Review::Approve => ApprovalStatus::Approved,
            Review::Reject => ApprovalStatus::Rejected,
        }),
        decided => Err(AppError::BusinessRule(format!(
            "Attendance is already {decided}"
        ))),
    }
}

/// One attendance row as the monthly report reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub employee_id: u64,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub hours_worked: Decimal,
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MonthlyLine {
    pub employee_id: u64,
    pub full_name: String,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub leave: u32,
    pub sick: u32,
    /// PRESENT + LATE
    pub days_worked: u32,
    #[schema(value_type = String)]
    pub hours_worked: Decimal,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
}

/// Per-employee counts and totals, ordered by employee id.
pub fn summarize_month(rows: &[ReportRow]) -> Vec<MonthlyLine> {
    let mut lines: BTreeMap<u64, MonthlyLine> = BTreeMap::new();

    for row in rows {
        let line = lines.entry(row.employee_id).or_insert_with(|| MonthlyLine {
            employee_id: row.employee_id,
            full_name: row.full_name.clone(),
            ..Default::default()
        });

        match row.status {
            AttendanceStatus::Present => line.present += 1,
            AttendanceStatus::Late => line.late += 1,
            AttendanceStatus::Absent => line.absent += 1,
            AttendanceStatus::Leave => line.leave += 1,
            AttendanceStatus::Sick => line.sick += 1,
        }
        if row.status.is_worked() {
            line.days_worked += 1;
        }
        line.hours_worked += row.hours_worked;
        line.overtime_hours += row.overtime_hours;
    }

    lines.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn on_shift(from: NaiveTime) -> Clock {
        Clock {
            check_in: Some(from),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(t(8, 0), t(16, 0), 0, dec!(8), dec!(0))]
    #[case(t(8, 0), t(17, 20), 60, dec!(8.33), dec!(0.33))]
    #[case(t(9, 0), t(9, 10), 0, dec!(0.17), dec!(0))]
    #[case(t(9, 0), t(9, 30), 45, dec!(0), dec!(0))]
    fn test_worked_hours(
        #[case] check_in: NaiveTime,
        #[case] check_out: NaiveTime,
        #[case] break_minutes: u32,
        #[case] hours: Decimal,
        #[case] overtime: Decimal,
    ) {
        let clock = Clock {
            check_in: Some(check_in),
            check_out: Some(check_out),
            break_seconds: break_seconds_from_minutes(break_minutes),
            ..Default::default()
        };
        let worked = worked_hours(&clock, dec!(8)).unwrap();
        assert_eq!(worked.hours, hours);
        assert_eq!(worked.overtime, overtime);
    }

    fn ts(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_worked_hours_keep_seconds() {
        let clock = Clock {
            check_in: Some(ts(8, 0, 0)),
            check_out: Some(ts(16, 0, 50)),
            ..Default::default()
        };
        assert_eq!(worked_hours(&clock, dec!(8)).unwrap().hours, dec!(8.01));

        // 12:00:00 to 12:30:40 on break leaves 7h29m20s
        let clock = start_break(&on_shift(ts(8, 0, 0)), ts(12, 0, 0)).unwrap();
        let clock = end_break(&clock, ts(12, 30, 40)).unwrap();
        assert_eq!(clock.break_seconds, 1840);
        let clock = check_out(&clock, ts(16, 0, 0)).unwrap();
        assert_eq!(worked_hours(&clock, dec!(8)).unwrap().hours, dec!(7.49));
    }

    #[test]
    fn test_break_total_saturates() {
        let clock = Clock {
            break_seconds: u32::MAX - 10,
            ..on_shift(t(8, 0))
        };
        let clock = start_break(&clock, t(12, 0)).unwrap();
        let clock = end_break(&clock, t(12, 30)).unwrap();
        assert_eq!(clock.break_seconds, u32::MAX);
        assert_eq!(break_seconds_from_minutes(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_open_record_has_no_hours() {
        assert_eq!(worked_hours(&on_shift(t(8, 0)), dec!(8)).unwrap(), WorkedHours::ZERO);
    }

    #[test]
    fn test_check_out_before_check_in_rejected() {
        let clock = Clock {
            check_in: Some(t(10, 0)),
            check_out: Some(t(9, 0)),
            ..Default::default()
        };
        assert!(matches!(worked_hours(&clock, dec!(8)), Err(AppError::Validation(_))));
    }

    #[rstest]
    #[case(t(7, 55), AttendanceStatus::Present)]
    #[case(t(8, 15), AttendanceStatus::Present)]
    #[case(t(8, 16), AttendanceStatus::Late)]
    fn test_arrival_status(#[case] check_in: NaiveTime, #[case] expected: AttendanceStatus) {
        assert_eq!(arrival_status(check_in, t(8, 0), 15), expected);
    }

    #[test]
    fn test_breaks_accumulate() {
        let clock = on_shift(t(8, 0));
        let clock = start_break(&clock, t(12, 0)).unwrap();
        assert!(start_break(&clock, t(12, 5)).is_err());

        let clock = end_break(&clock, t(12, 45)).unwrap();
        assert_eq!(clock.break_seconds, 45 * 60);
        assert_eq!(clock.break_end, Some(t(12, 45)));

        let clock = start_break(&clock, t(15, 0)).unwrap();
        let clock = end_break(&clock, t(15, 15)).unwrap();
        assert_eq!(clock.break_seconds, 60 * 60);

        let clock = check_out(&clock, t(17, 0)).unwrap();
        let worked = worked_hours(&clock, dec!(8)).unwrap();
        assert_eq!(worked.hours, dec!(8));
    }

    #[test]
    fn test_check_out_closes_open_break() {
        let clock = start_break(&on_shift(t(8, 0)), t(16, 30)).unwrap();
        let clock = check_out(&clock, t(17, 0)).unwrap();
        assert_eq!(clock.break_seconds, 30 * 60);
        assert!(clock.break_start.is_none());
        assert_eq!(clock.check_out, Some(t(17, 0)));
    }

    #[test]
    fn test_break_requires_open_shift() {
        assert!(start_break(&Clock::default(), t(12, 0)).is_err());
        assert!(end_break(&on_shift(t(8, 0)), t(12, 0)).is_err());

        let done = check_out(&on_shift(t(8, 0)), t(16, 0)).unwrap();
        assert!(start_break(&done, t(16, 30)).is_err());
        assert!(check_out(&done, t(17, 0)).is_err());
    }

    #[rstest]
    #[case(ApprovalStatus::Pending, Review::Approve, Some(ApprovalStatus::Approved))]
    #[case(ApprovalStatus::Corrected, Review::Reject, Some(ApprovalStatus::Rejected))]
    #[case(ApprovalStatus::Pending, Review::Reject, Some(ApprovalStatus::Rejected))]
    #[case(ApprovalStatus::Approved, Review::Reject, None)]
    #[case(ApprovalStatus::Rejected, Review::Approve, None)]
    fn test_review(
        #[case] current: ApprovalStatus,
        #[case] decision: Review,
        #[case] expected: Option<ApprovalStatus>,
    ) {
        let result = review(current, decision);
        match expected {
            Some(next) => assert_eq!(result.ok(), Some(next)),
            None => assert!(matches!(result, Err(AppError::BusinessRule(_)))),
        }
    }

    #[test]
    fn test_month_summary() {
        let row = |employee_id: u64, status, hours: Decimal, overtime: Decimal| ReportRow {
            employee_id,
            full_name: format!("Employee {employee_id}"),
            status,
            hours_worked: hours,
            overtime_hours: overtime,
        };
        let rows = vec![
            row(2, AttendanceStatus::Present, dec!(8), dec!(0)),
            row(1, AttendanceStatus::Late, dec!(7.5), dec!(0)),
            row(1, AttendanceStatus::Present, dec!(9.25), dec!(1.25)),
            row(1, AttendanceStatus::Sick, dec!(0), dec!(0)),
        ];

        let lines = summarize_month(&rows);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].employee_id, 1);
        assert_eq!(lines[0].present, 1);
        assert_eq!(lines[0].late, 1);
        assert_eq!(lines[0].sick, 1);
        assert_eq!(lines[0].days_worked, 2);
        assert_eq!(lines[0].hours_worked, dec!(16.75));
        assert_eq!(lines[0].overtime_hours, dec!(1.25));
        assert_eq!(lines[1].days_worked, 1);
    }
}
