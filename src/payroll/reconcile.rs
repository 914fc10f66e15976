use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::payslip::PayslipStatus;

/// Status is a pure function of net amount vs. total paid.
pub fn payslip_status(net: Decimal, total_paid: Decimal) -> PayslipStatus {
    if total_paid <= Decimal::ZERO {
        PayslipStatus::Pending
    } else if total_paid >= net {
        PayslipStatus::Paid
    } else {
        PayslipStatus::Partial
    }
}

pub fn remaining(net: Decimal, total_paid: Decimal) -> Decimal {
    (net - total_paid).max(Decimal::ZERO)
}

/// Outcome of recording money against a payslip.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Settlement {
    #[schema(value_type = String)]
    pub total_paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    pub status: PayslipStatus,
}

fn settle(net: Decimal, total_paid: Decimal) -> Settlement {
    Settlement {
        total_paid,
        remaining: remaining(net, total_paid),
        status: payslip_status(net, total_paid),
    }
}

fn ensure_positive(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Payment amount must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Checks a new payment of `amount` against a payslip whose existing payments
/// sum to `paid_so_far`. Nothing is mutated when this returns an error.
pub fn plan_payment(net: Decimal, paid_so_far: Decimal, amount: Decimal) -> AppResult<Settlement> {
    ensure_positive(amount)?;

    if payslip_status(net, paid_so_far) == PayslipStatus::Paid {
        return Err(AppError::BusinessRule("Payslip is already fully paid".into()));
    }

    let balance = remaining(net, paid_so_far);
    if amount > balance {
        return Err(AppError::BusinessRule(format!(
            "Payment of {amount} exceeds the remaining balance of {balance}"
        )));
    }

    Ok(settle(net, paid_so_far + amount))
}

/// Re-checks an edited payment. `paid_by_others` excludes the payment being
/// edited.
pub fn plan_payment_update(
    net: Decimal,
    paid_by_others: Decimal,
    new_amount: Decimal,
) -> AppResult<Settlement> {
    ensure_positive(new_amount)?;

    let balance = remaining(net, paid_by_others);
    if new_amount > balance {
        return Err(AppError::BusinessRule(format!(
            "Payment of {new_amount} exceeds the remaining balance of {balance}"
        )));
    }

    Ok(settle(net, paid_by_others + new_amount))
}

/// State of a payslip once one of its payments is removed.
pub fn after_removal(net: Decimal, paid_by_others: Decimal) -> Settlement {
    settle(net, paid_by_others)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(500000), dec!(0), PayslipStatus::Pending)]
    #[case(dec!(500000), dec!(1), PayslipStatus::Partial)]
    #[case(dec!(500000), dec!(499999.99), PayslipStatus::Partial)]
    #[case(dec!(500000), dec!(500000), PayslipStatus::Paid)]
    #[case(dec!(0), dec!(0), PayslipStatus::Pending)]
    fn test_status_from_sum(
        #[case] net: Decimal,
        #[case] paid: Decimal,
        #[case] expected: PayslipStatus,
    ) {
        assert_eq!(payslip_status(net, paid), expected);
    }

    #[test]
    fn test_partial_then_full_then_rejected() {
        let net = dec!(500000);

        let first = plan_payment(net, dec!(0), dec!(200000)).unwrap();
        assert_eq!(first.status, PayslipStatus::Partial);
        assert_eq!(first.remaining, dec!(300000));

        let second = plan_payment(net, first.total_paid, dec!(300000)).unwrap();
        assert_eq!(second.status, PayslipStatus::Paid);
        assert_eq!(second.remaining, dec!(0));

        let third = plan_payment(net, second.total_paid, dec!(0.01));
        assert!(matches!(third, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_overpayment_rejected() {
        let result = plan_payment(dec!(300000), dec!(100000), dec!(200000.01));
        assert!(matches!(result, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_exact_balance_accepted() {
        let settled = plan_payment(dec!(300000), dec!(100000), dec!(200000)).unwrap();
        assert_eq!(settled.status, PayslipStatus::Paid);
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    fn test_non_positive_amount_rejected(#[case] amount: Decimal) {
        assert!(matches!(
            plan_payment(dec!(1000), dec!(0), amount),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            plan_payment_update(dec!(1000), dec!(0), amount),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_update_excludes_own_amount() {
        // net 500k, another payment of 300k, this one raised from 100k to 200k
        let settled = plan_payment_update(dec!(500000), dec!(300000), dec!(200000)).unwrap();
        assert_eq!(settled.status, PayslipStatus::Paid);

        let too_much = plan_payment_update(dec!(500000), dec!(300000), dec!(200001));
        assert!(too_much.is_err());
    }

    #[test]
    fn test_removal_reverts_status() {
        assert_eq!(after_removal(dec!(500000), dec!(0)).status, PayslipStatus::Pending);
        assert_eq!(
            after_removal(dec!(500000), dec!(200000)).status,
            PayslipStatus::Partial
        );
    }
}
