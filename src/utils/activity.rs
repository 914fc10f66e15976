use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display};
use tracing::warn;

use crate::auth::auth::AuthUser;

/// Stored in `activities.action` under its SCREAMING_SNAKE_CASE name.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    EnterpriseCreated,
    EnterpriseUpdated,
    EnterpriseToggled,
    EnterpriseDeleted,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeToggled,
    EmployeeDeleted,
    PayRunCreated,
    PayRunDeleted,
    PayRunApproved,
    PayRunClosed,
    PaymentRecorded,
    PaymentUpdated,
    PaymentDeleted,
    AttendanceApproved,
    AttendanceRejected,
    DayLocked,
    DayUnlocked,
    UserCreated,
}

/// Appends a row to the dashboard activity feed. Failures are logged and
/// swallowed so a broken feed never fails the action it describes.
pub async fn record(
    pool: &MySqlPool,
    auth: &AuthUser,
    enterprise_id: Option<u64>,
    action: ActivityAction,
    description: String,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO activities (enterprise_id, user_id, action, description)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(enterprise_id)
    .bind(auth.user_id)
    .bind(action.as_ref())
    .bind(&description)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(error = %e, %action, "Failed to record activity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActivityAction::PayRunApproved, "PAY_RUN_APPROVED")]
    #[case(ActivityAction::PaymentUpdated, "PAYMENT_UPDATED")]
    #[case(ActivityAction::EmployeeDeleted, "EMPLOYEE_DELETED")]
    #[case(ActivityAction::EmployeeUpdated, "EMPLOYEE_UPDATED")]
    #[case(ActivityAction::DayUnlocked, "DAY_UNLOCKED")]
    fn test_action_names(#[case] action: ActivityAction, #[case] stored: &str) {
        assert_eq!(action.as_ref(), stored);
        assert_eq!(action.to_string(), stored);
    }
}
