use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::model::role::Role;

#[derive(Deserialize, Validate, ToSchema)]
pub struct RegisterReq {
    #[validate(email)]
    #[schema(example = "caissier@sen-services.sn")]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 191))]
    #[schema(example = "Fatou Sarr")]
    pub full_name: String,
    pub role: Role,
    /// Required for every role except SUPER_ADMIN.
    pub enterprise_id: Option<u64>,
    /// Links the account to an employee record (EMPLOYEE role).
    pub employee_id: Option<u64>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginReqDto {
    #[validate(email)]
    #[schema(example = "admin@sen-services.sn")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Absent for SUPER_ADMIN
    pub enterprise_id: Option<u64>,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
