pub mod activity;
pub mod attendance;
pub mod day_summary;
pub mod employee;
pub mod enterprise;
pub mod pay_run;
pub mod payment;
pub mod payslip;
pub mod role;
pub mod user;

/// Status-like columns are VARCHARs holding the strum name; rows decode them
/// through `#[sqlx(try_from = "String")]`.
macro_rules! impl_try_from_string {
    ($($ty:ty),+ $(,)?) => {$(
        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )+};
}

impl_try_from_string!(
    enterprise::PayPeriodType,
    employee::ContractType,
    pay_run::PayRunStatus,
    payslip::PayslipStatus,
    payment::PaymentMethod,
    attendance::AttendanceStatus,
    attendance::ApprovalStatus,
);
