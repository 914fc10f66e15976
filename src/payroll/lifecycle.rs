use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::employee::{ContractType, Employee};
use crate::model::pay_run::PayRunStatus;
use crate::model::payslip::PayslipStatus;

use super::reconcile;
use super::workdays::count_weekdays;

/// Lifecycle actions a pay run accepts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PayRunAction {
    Approve,
    Close,
}

/// `DRAFT -> APPROVED -> CLOSED`, nothing else.
pub fn transition(current: PayRunStatus, action: PayRunAction) -> AppResult<PayRunStatus> {
    match (current, action) {
        (PayRunStatus::Draft, PayRunAction::Approve) => Ok(PayRunStatus::Approved),
        (PayRunStatus::Approved, PayRunAction::Close) => Ok(PayRunStatus::Closed),
        (from, PayRunAction::Approve) => Err(AppError::BusinessRule(format!(
            "Invalid state: only a DRAFT pay run can be approved (current: {from})"
        ))),
        (from, PayRunAction::Close) => Err(AppError::BusinessRule(format!(
            "Invalid state: only an APPROVED pay run can be closed (current: {from})"
        ))),
    }
}

/// Payslips and the pay run itself are editable only while the run is DRAFT.
pub fn ensure_editable(status: PayRunStatus) -> AppResult<()> {
    if status == PayRunStatus::Draft {
        Ok(())
    } else {
        Err(AppError::BusinessRule(format!(
            "Invalid state: pay run is {status}, only DRAFT pay runs can be modified"
        )))
    }
}

/// Where daily-rate employees get their days worked from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaysSource {
    /// Monday–Friday count over the period.
    #[default]
    Calendar,
    /// Worked day summaries recorded for the employee in the period.
    Attendance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayslip {
    pub employee_id: u64,
    pub days_worked: Option<u32>,
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    pub status: PayslipStatus,
}

pub fn gross_for(contract: ContractType, rate: Decimal, days_worked: Option<u32>) -> Decimal {
    match contract {
        ContractType::Fixed | ContractType::Fee => rate,
        ContractType::Daily => rate * Decimal::from(days_worked.unwrap_or(0)),
    }
}

/// One PENDING payslip per active employee, zero deductions.
///
/// `worked_days` is consulted only for daily-rate employees when the source is
/// [`DaysSource::Attendance`]; employees missing from it worked zero days.
pub fn generate_payslips<F>(
    employees: &[Employee],
    period_start: NaiveDate,
    period_end: NaiveDate,
    source: DaysSource,
    worked_days: F,
) -> Vec<NewPayslip>
where
    F: Fn(u64) -> u32,
{
    let calendar_days = count_weekdays(period_start, period_end);

    employees
        .iter()
        .filter(|e| e.is_active)
        .map(|e| {
            let days_worked = match e.contract_type {
                ContractType::Daily => Some(match source {
                    DaysSource::Calendar => calendar_days,
                    DaysSource::Attendance => worked_days(e.id),
                }),
                _ => None,
            };
            let gross = gross_for(e.contract_type, e.rate, days_worked);

            NewPayslip {
                employee_id: e.id,
                days_worked,
                gross,
                deductions: Decimal::ZERO,
                net: gross,
                status: PayslipStatus::Pending,
            }
        })
        .collect()
}

/// Requested changes to a payslip.
#[derive(Debug, Clone, Default)]
pub struct PayslipEdit {
    pub days_worked: Option<u32>,
    pub gross: Option<Decimal>,
    pub deductions: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayslipAmounts {
    pub days_worked: Option<u32>,
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    pub status: PayslipStatus,
}

/// Applies an edit to a payslip of a DRAFT pay run.
///
/// Daily-rate payslips derive gross from `rate × days`; the others accept a
/// direct gross. The resulting net may neither go negative nor fall below what
/// has already been paid against the payslip.
pub fn apply_payslip_edit(
    current: &PayslipAmounts,
    contract: ContractType,
    rate: Decimal,
    edit: &PayslipEdit,
    already_paid: Decimal,
) -> AppResult<PayslipAmounts> {
    let mut days_worked = current.days_worked;
    let mut gross = current.gross;

    match contract {
        ContractType::Daily => {
            if edit.gross.is_some() {
                return Err(AppError::Validation(
                    "gross is derived from days_worked for daily-rate contracts".into(),
                ));
            }
            if let Some(days) = edit.days_worked {
                if days_worked != Some(days) {
                    days_worked = Some(days);
                    gross = gross_for(contract, rate, days_worked);
                }
            }
        }
        _ => {
            if edit.days_worked.is_some() {
                return Err(AppError::Validation(
                    "days_worked only applies to daily-rate contracts".into(),
                ));
            }
            if let Some(g) = edit.gross {
                gross = g;
            }
        }
    }

    let deductions = edit.deductions.unwrap_or(current.deductions);
    if gross < Decimal::ZERO || deductions < Decimal::ZERO {
        return Err(AppError::Validation(
            "gross and deductions must not be negative".into(),
        ));
    }

    let net = gross - deductions;
    if net < Decimal::ZERO {
        return Err(AppError::BusinessRule(
            "deductions cannot exceed gross amount".into(),
        ));
    }
    if net < already_paid {
        return Err(AppError::BusinessRule(format!(
            "net amount {net} would fall below the {already_paid} already paid"
        )));
    }

    Ok(PayslipAmounts {
        days_worked,
        gross,
        deductions,
        net,
        status: reconcile::payslip_status(net, already_paid),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn employee(id: u64, contract_type: ContractType, rate: Decimal, is_active: bool) -> Employee {
        Employee {
            id,
            enterprise_id: 1,
            full_name: format!("Employee {id}"),
            position: "Agent".into(),
            contract_type,
            rate,
            bank_details: None,
            is_active,
            created_at: NaiveDateTime::default(),
        }
    }

    fn june() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        )
    }

    #[rstest]
    #[case(PayRunStatus::Draft, PayRunAction::Approve, Some(PayRunStatus::Approved))]
    #[case(PayRunStatus::Approved, PayRunAction::Close, Some(PayRunStatus::Closed))]
    #[case(PayRunStatus::Draft, PayRunAction::Close, None)]
    #[case(PayRunStatus::Approved, PayRunAction::Approve, None)]
    #[case(PayRunStatus::Closed, PayRunAction::Approve, None)]
    #[case(PayRunStatus::Closed, PayRunAction::Close, None)]
    fn test_transitions(
        #[case] from: PayRunStatus,
        #[case] action: PayRunAction,
        #[case] expected: Option<PayRunStatus>,
    ) {
        let result = transition(from, action);
        match expected {
            Some(to) => assert_eq!(result.ok(), Some(to)),
            None => assert!(matches!(result, Err(AppError::BusinessRule(_)))),
        }
    }

    #[test]
    fn test_only_draft_is_editable() {
        assert!(ensure_editable(PayRunStatus::Draft).is_ok());
        assert!(ensure_editable(PayRunStatus::Approved).is_err());
        assert!(ensure_editable(PayRunStatus::Closed).is_err());
    }

    #[test]
    fn test_one_payslip_per_active_employee() {
        let (start, end) = june();
        let staff = vec![
            employee(1, ContractType::Fixed, dec!(500000), true),
            employee(2, ContractType::Fixed, dec!(300000), true),
            employee(3, ContractType::Fixed, dec!(900000), false),
        ];

        let slips = generate_payslips(&staff, start, end, DaysSource::Calendar, |_| 0);

        assert_eq!(slips.len(), 2);
        assert_eq!(slips[0].employee_id, 1);
        assert_eq!(slips[0].gross, dec!(500000));
        assert_eq!(slips[0].net, dec!(500000));
        assert_eq!(slips[1].gross, dec!(300000));
        assert!(slips.iter().all(|s| s.deductions.is_zero()));
        assert!(slips.iter().all(|s| s.status == PayslipStatus::Pending));
        assert!(slips.iter().all(|s| s.days_worked.is_none()));
    }

    #[test]
    fn test_daily_rate_uses_weekday_count() {
        let (start, end) = june();
        let staff = vec![employee(7, ContractType::Daily, dec!(10000), true)];

        let slips = generate_payslips(&staff, start, end, DaysSource::Calendar, |_| 99);

        assert_eq!(slips[0].days_worked, Some(22));
        assert_eq!(slips[0].gross, dec!(220000));
    }

    #[test]
    fn test_daily_rate_from_attendance() {
        let (start, end) = june();
        let staff = vec![
            employee(7, ContractType::Daily, dec!(10000), true),
            employee(8, ContractType::Fee, dec!(150000), true),
        ];

        let slips = generate_payslips(&staff, start, end, DaysSource::Attendance, |id| {
            if id == 7 { 18 } else { 0 }
        });

        assert_eq!(slips[0].days_worked, Some(18));
        assert_eq!(slips[0].gross, dec!(180000));
        assert_eq!(slips[1].gross, dec!(150000));
    }

    #[test]
    fn test_no_active_employees_yields_no_payslips() {
        let (start, end) = june();
        let staff = vec![employee(1, ContractType::Fixed, dec!(1), false)];
        assert!(generate_payslips(&staff, start, end, DaysSource::Calendar, |_| 0).is_empty());
    }

    fn amounts(days: Option<u32>, gross: Decimal, deductions: Decimal) -> PayslipAmounts {
        PayslipAmounts {
            days_worked: days,
            gross,
            deductions,
            net: gross - deductions,
            status: PayslipStatus::Pending,
        }
    }

    #[test]
    fn test_changing_days_recomputes_daily_gross() {
        let current = amounts(Some(22), dec!(220000), dec!(0));
        let edit = PayslipEdit {
            days_worked: Some(20),
            deductions: Some(dec!(5000)),
            ..Default::default()
        };

        let updated =
            apply_payslip_edit(&current, ContractType::Daily, dec!(10000), &edit, dec!(0)).unwrap();

        assert_eq!(updated.days_worked, Some(20));
        assert_eq!(updated.gross, dec!(200000));
        assert_eq!(updated.net, dec!(195000));
        assert_eq!(updated.status, PayslipStatus::Pending);
    }

    #[test]
    fn test_fixed_contract_rejects_days() {
        let current = amounts(None, dec!(500000), dec!(0));
        let edit = PayslipEdit {
            days_worked: Some(3),
            ..Default::default()
        };
        let result = apply_payslip_edit(&current, ContractType::Fixed, dec!(500000), &edit, dec!(0));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_deductions_above_gross_rejected() {
        let current = amounts(None, dec!(500000), dec!(0));
        let edit = PayslipEdit {
            deductions: Some(dec!(600000)),
            ..Default::default()
        };
        let result = apply_payslip_edit(&current, ContractType::Fixed, dec!(500000), &edit, dec!(0));
        assert!(matches!(result, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_net_cannot_drop_below_paid() {
        let current = amounts(None, dec!(500000), dec!(0));
        let edit = PayslipEdit {
            deductions: Some(dec!(350000)),
            ..Default::default()
        };
        let result =
            apply_payslip_edit(&current, ContractType::Fixed, dec!(500000), &edit, dec!(200000));
        assert!(matches!(result, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_edit_recomputes_status_from_payments() {
        let current = amounts(None, dec!(500000), dec!(0));
        let edit = PayslipEdit {
            deductions: Some(dec!(300000)),
            ..Default::default()
        };
        let updated =
            apply_payslip_edit(&current, ContractType::Fixed, dec!(500000), &edit, dec!(200000))
                .unwrap();
        assert_eq!(updated.net, dec!(200000));
        assert_eq!(updated.status, PayslipStatus::Paid);
    }
}
