use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::payslip::PayslipLine;

use super::reconcile::remaining;

/// Totals of one pay run as read from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunTotals {
    pub pay_run_id: u64,
    pub created_at: NaiveDateTime,
    pub gross: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthPoint {
    /// `YYYY-MM` of the pay runs' creation date.
    #[schema(example = "2026-06")]
    pub month: String,
    pub pay_runs: u32,
    #[schema(value_type = String)]
    pub gross: Decimal,
    #[schema(value_type = String)]
    pub paid: Decimal,
}

/// Buckets pay runs by creation month, oldest month first.
pub fn group_by_month(runs: &[RunTotals]) -> Vec<MonthPoint> {
    let mut buckets: BTreeMap<String, MonthPoint> = BTreeMap::new();

    for run in runs {
        let month = run.created_at.format("%Y-%m").to_string();
        let point = buckets.entry(month.clone()).or_insert_with(|| MonthPoint {
            month,
            pay_runs: 0,
            gross: Decimal::ZERO,
            paid: Decimal::ZERO,
        });
        point.pay_runs += 1;
        point.gross += run.gross;
        point.paid += run.paid;
    }

    buckets.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollKpis {
    /// Id of the pay run the figures come from, if any.
    pub pay_run_id: Option<u64>,
    /// Sum of gross amounts ("masse salariale").
    #[schema(value_type = String)]
    pub masse_salariale: Decimal,
    #[schema(value_type = String)]
    pub total_net: Decimal,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    pub active_employees: i64,
}

impl PayrollKpis {
    pub fn compute(
        pay_run_id: Option<u64>,
        gross: Decimal,
        net: Decimal,
        paid: Decimal,
        active_employees: i64,
    ) -> Self {
        Self {
            pay_run_id,
            masse_salariale: gross,
            total_net: net,
            total_paid: paid,
            remaining: remaining(net, paid),
            active_employees,
        }
    }
}

/// Sums over the payslips of one pay run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PayRunTotals {
    pub payslips: u32,
    #[schema(value_type = String)]
    pub gross: Decimal,
    #[schema(value_type = String)]
    pub deductions: Decimal,
    #[schema(value_type = String)]
    pub net: Decimal,
    #[schema(value_type = String)]
    pub paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
}

impl PayRunTotals {
    pub fn from_lines(lines: &[PayslipLine]) -> Self {
        let mut totals = lines.iter().fold(Self::default(), |mut acc, line| {
            acc.payslips += 1;
            acc.gross += line.gross;
            acc.deductions += line.deductions;
            acc.net += line.net;
            acc.paid += line.total_paid;
            acc
        });
        totals.remaining = remaining(totals.net, totals.paid);
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn run(id: u64, y: i32, m: u32, d: u32, gross: Decimal, paid: Decimal) -> RunTotals {
        RunTotals {
            pay_run_id: id,
            created_at: NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|day| day.and_hms_opt(10, 0, 0))
                .unwrap(),
            gross,
            paid,
        }
    }

    #[test]
    fn test_groups_by_creation_month() {
        let runs = vec![
            run(3, 2026, 6, 28, dec!(800000), dec!(0)),
            run(2, 2026, 5, 7, dec!(400000), dec!(400000)),
            run(1, 2026, 5, 1, dec!(800000), dec!(500000)),
            run(0, 2025, 12, 31, dec!(100), dec!(100)),
        ];

        let points = group_by_month(&runs);

        let months: Vec<&str> = points.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["2025-12", "2026-05", "2026-06"]);
        assert_eq!(points[1].pay_runs, 2);
        assert_eq!(points[1].gross, dec!(1200000));
        assert_eq!(points[1].paid, dec!(900000));
    }

    #[test]
    fn test_empty_history() {
        assert!(group_by_month(&[]).is_empty());
    }

    #[test]
    fn test_pay_run_totals() {
        use crate::model::payslip::PayslipStatus;

        let line = |id: u64, net: Decimal, paid: Decimal| PayslipLine {
            id,
            pay_run_id: 1,
            employee_id: id,
            employee_name: format!("Employee {id}"),
            days_worked: None,
            gross: net,
            deductions: dec!(0),
            net,
            total_paid: paid,
            status: PayslipStatus::Pending,
            created_at: NaiveDateTime::default(),
        };

        let totals = PayRunTotals::from_lines(&[
            line(1, dec!(500000), dec!(500000)),
            line(2, dec!(300000), dec!(100000)),
        ]);

        assert_eq!(totals.payslips, 2);
        assert_eq!(totals.gross, dec!(800000));
        assert_eq!(totals.paid, dec!(600000));
        assert_eq!(totals.remaining, dec!(200000));
        assert_eq!(PayRunTotals::from_lines(&[]), PayRunTotals::default());
    }

    #[test]
    fn test_kpis_remaining() {
        let kpis = PayrollKpis::compute(Some(4), dec!(800000), dec!(780000), dec!(200000), 2);
        assert_eq!(kpis.masse_salariale, dec!(800000));
        assert_eq!(kpis.remaining, dec!(580000));
    }
}
