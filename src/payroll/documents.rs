use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{
    employee::{ContractType, Employee},
    enterprise::{Enterprise, PayPeriodType},
    pay_run::{PayRun, PayRunStatus},
    payment::Payment,
    payslip::{PayslipLine, PayslipStatus},
};

use super::reconcile::remaining;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnterpriseHeader {
    pub name: String,
    pub address: Option<String>,
    pub currency: String,
    pub logo_path: Option<String>,
}

impl From<&Enterprise> for EnterpriseHeader {
    fn from(e: &Enterprise) -> Self {
        Self {
            name: e.name.clone(),
            address: e.address.clone(),
            currency: e.currency.clone(),
            logo_path: e.logo_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeHeader {
    pub id: u64,
    pub full_name: String,
    pub position: String,
    pub contract_type: ContractType,
    #[schema(value_type = String)]
    pub rate: Decimal,
    pub bank_details: Option<String>,
}

impl From<&Employee> for EmployeeHeader {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            full_name: e.full_name.clone(),
            position: e.position.clone(),
            contract_type: e.contract_type,
            rate: e.rate,
            bank_details: e.bank_details.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PeriodHeader {
    pub pay_run_id: u64,
    pub period_type: PayPeriodType,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    pub status: PayRunStatus,
}

impl From<&PayRun> for PeriodHeader {
    fn from(r: &PayRun) -> Self {
        Self {
            pay_run_id: r.id,
            period_type: r.period_type,
            period_start: r.period_start,
            period_end: r.period_end,
            status: r.status,
        }
    }
}

/// Printable payslip content.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayslipDocument {
    #[schema(example = "PS-000004-000017")]
    pub document_number: String,
    pub enterprise: EnterpriseHeader,
    pub employee: EmployeeHeader,
    pub period: PeriodHeader,
    pub days_worked: Option<u32>,
    #[schema(value_type = String)]
    pub gross: Decimal,
    #[schema(value_type = String)]
    pub deductions: Decimal,
    #[schema(value_type = String)]
    pub net: Decimal,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    pub status: PayslipStatus,
    pub payments: Vec<Payment>,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: NaiveDateTime,
}

/// Printable proof of one payment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentReceipt {
    #[schema(example = "RC-000042")]
    pub receipt_number: String,
    pub enterprise: EnterpriseHeader,
    pub employee: EmployeeHeader,
    pub period: PeriodHeader,
    pub payment: Payment,
    #[schema(value_type = String)]
    pub payslip_net: Decimal,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    pub payslip_status: PayslipStatus,
    #[schema(value_type = String, format = "date-time")]
    pub issued_at: NaiveDateTime,
}

/// One document per payslip line, in line order. Lines whose employee is
/// missing from `employees` are skipped.
pub fn payslip_documents(
    enterprise: &Enterprise,
    pay_run: &PayRun,
    lines: &[PayslipLine],
    employees: &HashMap<u64, Employee>,
    payments: &[Payment],
    generated_at: NaiveDateTime,
) -> Vec<PayslipDocument> {
    let mut by_payslip: HashMap<u64, Vec<Payment>> = HashMap::new();
    for payment in payments {
        by_payslip.entry(payment.payslip_id).or_default().push(payment.clone());
    }

    lines
        .iter()
        .filter_map(|line| {
            let employee = employees.get(&line.employee_id)?;
            let payments = by_payslip.remove(&line.id).unwrap_or_default();

            Some(PayslipDocument {
                document_number: format!("PS-{:06}-{:06}", pay_run.id, line.id),
                enterprise: enterprise.into(),
                employee: employee.into(),
                period: pay_run.into(),
                days_worked: line.days_worked,
                gross: line.gross,
                deductions: line.deductions,
                net: line.net,
                total_paid: line.total_paid,
                remaining: remaining(line.net, line.total_paid),
                status: line.status,
                payments,
                generated_at,
            })
        })
        .collect()
}

pub fn payment_receipt(
    enterprise: &Enterprise,
    pay_run: &PayRun,
    employee: &Employee,
    line: &PayslipLine,
    payment: Payment,
    issued_at: NaiveDateTime,
) -> PaymentReceipt {
    PaymentReceipt {
        receipt_number: format!("RC-{:06}", payment.id),
        enterprise: enterprise.into(),
        employee: employee.into(),
        period: pay_run.into(),
        payment,
        payslip_net: line.net,
        total_paid: line.total_paid,
        remaining: remaining(line.net, line.total_paid),
        payslip_status: line.status,
        issued_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payment::PaymentMethod;
    use rust_decimal_macros::dec;

    fn enterprise() -> Enterprise {
        Enterprise {
            id: 1,
            name: "Sen Services".into(),
            address: None,
            currency: "XOF".into(),
            pay_period_type: PayPeriodType::Monthly,
            logo_path: Some("uploads/logo.png".into()),
            is_active: true,
            created_by: None,
            created_at: NaiveDateTime::default(),
        }
    }

    fn pay_run() -> PayRun {
        PayRun {
            id: 4,
            enterprise_id: 1,
            period_type: PayPeriodType::Monthly,
            period_start: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            status: PayRunStatus::Approved,
            created_by: None,
            created_at: NaiveDateTime::default(),
            approved_at: None,
            closed_at: None,
        }
    }

    fn employee(id: u64) -> Employee {
        Employee {
            id,
            enterprise_id: 1,
            full_name: format!("Employee {id}"),
            position: "Agent".into(),
            contract_type: ContractType::Fixed,
            rate: dec!(500000),
            bank_details: None,
            is_active: true,
            created_at: NaiveDateTime::default(),
        }
    }

    fn line(id: u64, employee_id: u64, net: Decimal, paid: Decimal, status: PayslipStatus) -> PayslipLine {
        PayslipLine {
            id,
            pay_run_id: 4,
            employee_id,
            employee_name: format!("Employee {employee_id}"),
            days_worked: None,
            gross: net,
            deductions: dec!(0),
            net,
            total_paid: paid,
            status,
            created_at: NaiveDateTime::default(),
        }
    }

    fn payment(id: u64, payslip_id: u64, amount: Decimal) -> Payment {
        Payment {
            id,
            payslip_id,
            amount,
            method: PaymentMethod::Cash,
            reference: None,
            paid_at: NaiveDateTime::default(),
            created_by: Some(1),
        }
    }

    #[test]
    fn test_documents_attach_their_own_payments() {
        let employees: HashMap<u64, Employee> = [(1, employee(1)), (2, employee(2))].into();
        let lines = vec![
            line(10, 1, dec!(500000), dec!(300000), PayslipStatus::Partial),
            line(11, 2, dec!(300000), dec!(0), PayslipStatus::Pending),
        ];
        let payments = vec![
            payment(1, 10, dec!(200000)),
            payment(2, 10, dec!(100000)),
        ];

        let docs = payslip_documents(
            &enterprise(),
            &pay_run(),
            &lines,
            &employees,
            &payments,
            NaiveDateTime::default(),
        );

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_number, "PS-000004-000010");
        assert_eq!(docs[0].payments.len(), 2);
        assert_eq!(docs[0].remaining, dec!(200000));
        assert!(docs[1].payments.is_empty());
        assert_eq!(docs[1].remaining, dec!(300000));
        assert_eq!(docs[1].enterprise.currency, "XOF");
    }

    #[test]
    fn test_line_without_employee_is_skipped() {
        let docs = payslip_documents(
            &enterprise(),
            &pay_run(),
            &[line(10, 9, dec!(1), dec!(0), PayslipStatus::Pending)],
            &HashMap::new(),
            &[],
            NaiveDateTime::default(),
        );
        assert!(docs.is_empty());
    }

    #[test]
    fn test_receipt_numbers_and_balance() {
        let receipt = payment_receipt(
            &enterprise(),
            &pay_run(),
            &employee(1),
            &line(10, 1, dec!(500000), dec!(500000), PayslipStatus::Paid),
            payment(42, 10, dec!(300000)),
            NaiveDateTime::default(),
        );

        assert_eq!(receipt.receipt_number, "RC-000042");
        assert_eq!(receipt.remaining, dec!(0));
        assert_eq!(receipt.payslip_status, PayslipStatus::Paid);
        assert_eq!(receipt.period.period_start.to_string(), "2026-06-01");
    }
}
