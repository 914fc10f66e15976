use crate::api::attendance::{
    AttendanceListResponse, BulkCreateAttendance, CreateAttendance, MonthlyReport,
    ReviewAttendance, UpdateAttendance,
};
use crate::api::dashboard::{GlobalStats, UpcomingPayment};
use crate::api::day_summary::{DaySummaryListResponse, GenerateOutcome, GenerateSummaries};
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::enterprise::CreateEnterprise;
use crate::api::pay_run::{CreatePayRun, PayRunDetail, UpdatePayRun};
use crate::api::payment::{CreatePayment, PaymentListResponse, PaymentOutcome, UpdatePayment};
use crate::api::payslip::{PayslipDetail, UpdatePayslip};
use crate::model::activity::Activity;
use crate::model::attendance::{ApprovalStatus, Attendance, AttendanceAudit, AttendanceStatus};
use crate::model::day_summary::DaySummary;
use crate::model::employee::{ContractType, Employee};
use crate::model::enterprise::{Enterprise, PayPeriodType};
use crate::model::pay_run::{PayRun, PayRunStatus};
use crate::model::payment::{Payment, PaymentMethod};
use crate::model::payslip::{Payslip, PayslipLine, PayslipStatus};
use crate::model::role::Role;
use crate::model::user::UserSummary;
use crate::models::{LoginReqDto, RegisterReq, TokenPair};
use crate::payroll::documents::{
    EmployeeHeader, EnterpriseHeader, PaymentReceipt, PayslipDocument, PeriodHeader,
};
use crate::payroll::lifecycle::DaysSource;
use crate::payroll::reconcile::Settlement;
use crate::payroll::rollup::{MonthPoint, PayRunTotals, PayrollKpis};
use crate::utils::timesheet::MonthlyLine;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paie API",
        version = "1.0.0",
        description = r#"
## Payroll and attendance backend

Multi-tenant payroll for small enterprises: employees, pay runs with generated
payslips, partial payments, and daily attendance with approval.

### Security
Every `/api` endpoint expects a **JWT Bearer** access token. Data is scoped to
the caller's enterprise unless the caller is a SUPER_ADMIN.

### Money
Amounts are decimal strings (`"250000.00"`), never floats.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::enterprise::create_enterprise,
        crate::api::enterprise::list_enterprises,
        crate::api::enterprise::get_enterprise,
        crate::api::enterprise::update_enterprise,
        crate::api::enterprise::toggle_enterprise,
        crate::api::enterprise::delete_enterprise,

        crate::api::user::list_users,
        crate::api::user::toggle_user,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::toggle_employee,
        crate::api::employee::delete_employee,

        crate::api::pay_run::create_pay_run,
        crate::api::pay_run::list_pay_runs,
        crate::api::pay_run::get_pay_run,
        crate::api::pay_run::update_pay_run,
        crate::api::pay_run::delete_pay_run,
        crate::api::pay_run::approve_pay_run,
        crate::api::pay_run::close_pay_run,

        crate::api::payslip::list_payslips,
        crate::api::payslip::get_payslip,
        crate::api::payslip::update_payslip,
        crate::api::payslip::delete_payslip,
        crate::api::payslip::payslip_document,
        crate::api::payslip::pay_run_documents,

        crate::api::payment::create_payment,
        crate::api::payment::list_payments,
        crate::api::payment::get_payment,
        crate::api::payment::update_payment,
        crate::api::payment::delete_payment,
        crate::api::payment::payment_receipt_document,

        crate::api::attendance::check_in,
        crate::api::attendance::break_start,
        crate::api::attendance::break_end,
        crate::api::attendance::check_out,
        crate::api::attendance::create_attendance,
        crate::api::attendance::bulk_create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::approve_attendance,
        crate::api::attendance::reject_attendance,
        crate::api::attendance::attendance_audit,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::monthly_report,

        crate::api::day_summary::generate_summaries,
        crate::api::day_summary::lock_summary,
        crate::api::day_summary::unlock_summary,
        crate::api::day_summary::list_summaries,

        crate::api::dashboard::kpis,
        crate::api::dashboard::evolution,
        crate::api::dashboard::upcoming,
        crate::api::dashboard::global_stats,
        crate::api::dashboard::activities
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenPair,
            Role,
            UserSummary,
            Enterprise,
            PayPeriodType,
            CreateEnterprise,
            Employee,
            ContractType,
            CreateEmployee,
            EmployeeListResponse,
            PayRun,
            PayRunStatus,
            DaysSource,
            CreatePayRun,
            UpdatePayRun,
            PayRunDetail,
            PayRunTotals,
            Payslip,
            PayslipLine,
            PayslipStatus,
            UpdatePayslip,
            PayslipDetail,
            Payment,
            PaymentMethod,
            CreatePayment,
            UpdatePayment,
            PaymentListResponse,
            PaymentOutcome,
            Settlement,
            EnterpriseHeader,
            EmployeeHeader,
            PeriodHeader,
            PayslipDocument,
            PaymentReceipt,
            Attendance,
            AttendanceStatus,
            ApprovalStatus,
            AttendanceAudit,
            CreateAttendance,
            BulkCreateAttendance,
            UpdateAttendance,
            ReviewAttendance,
            AttendanceListResponse,
            MonthlyLine,
            MonthlyReport,
            DaySummary,
            GenerateSummaries,
            GenerateOutcome,
            DaySummaryListResponse,
            PayrollKpis,
            MonthPoint,
            UpcomingPayment,
            GlobalStats,
            Activity
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and account registration"),
        (name = "Enterprise", description = "Tenant management"),
        (name = "User", description = "Application accounts"),
        (name = "Employee", description = "Employee records"),
        (name = "PayRun", description = "Pay periods and their lifecycle"),
        (name = "Payslip", description = "Per-employee pay lines and documents"),
        (name = "Payment", description = "Payments against payslips"),
        (name = "Attendance", description = "Clock events, manual entries and approval"),
        (name = "DaySummary", description = "Daily attendance summaries and locking"),
        (name = "Dashboard", description = "KPIs and activity feed"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_payroll_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/payruns/{id}/approve"));
        assert!(doc.paths.paths.contains_key("/api/attendance/checkin"));
        assert!(doc.paths.paths.contains_key("/api/dashboard/kpis"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
