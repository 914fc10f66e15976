use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, RegisterReq, TokenPair, TokenType},
    utils::{activity::{self, ActivityAction}, email_cache, email_filter},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    let email = email.to_lowercase();

    // 1. cuckoo filter: a miss means the email was never registered
    if !email_filter::might_exist(&email) {
        return true;
    }

    // 2. moka cache: a hit means taken
    if email_cache::is_taken(&email).await {
        return false;
    }

    // 3. database fallback
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    !exists
}

/// Who may create which account.
fn authorize_registration(creator: &AuthUser, req: &RegisterReq) -> AppResult<()> {
    match creator.role {
        Role::SuperAdmin => {}
        Role::Admin => {
            if !matches!(req.role, Role::Cashier | Role::Employee) {
                return Err(AppError::Forbidden(
                    "Admins can only create CASHIER or EMPLOYEE accounts".into(),
                ));
            }
        }
        _ => return Err(AppError::Forbidden("Not allowed to create accounts".into())),
    }

    match (req.role, req.enterprise_id) {
        (Role::SuperAdmin, Some(_)) => Err(AppError::Validation(
            "SUPER_ADMIN accounts are not bound to an enterprise".into(),
        )),
        (Role::SuperAdmin, None) => Ok(()),
        (_, None) => Err(AppError::Validation(
            "enterprise_id is required for this role".into(),
        )),
        (_, Some(enterprise_id)) => creator.ensure_enterprise(enterprise_id),
    }
}

/// User registration handler. Requires a SUPER_ADMIN or ADMIN bearer token.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not allowed to create this account"),
        (status = 409, description = "Email already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(email = %user.email))]
pub async fn register(
    creator: AuthUser,
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    user.validate()?;
    authorize_registration(&creator, &user)?;

    let user = user.into_inner();
    let email = user.email.trim().to_lowercase();

    if !is_email_available(&email, pool.get_ref()).await {
        return Err(AppError::Conflict("Email already taken".into()));
    }

    if let (Some(employee_id), Some(enterprise_id)) = (user.employee_id, user.enterprise_id) {
        let owner = sqlx::query_scalar::<_, u64>("SELECT enterprise_id FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| AppError::not_found("Employee"))?;
        if owner != enterprise_id {
            return Err(AppError::Validation(
                "Employee belongs to another enterprise".into(),
            ));
        }
    }

    let password = user.password;
    let hashed = web::block(move || hash_password(&password))
        .await?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password, full_name, role_id, enterprise_id, employee_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(&hashed)
    .bind(user.full_name.trim())
    .bind(user.role.id())
    .bind(user.enterprise_id)
    .bind(user.employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email already taken".into()),
        other => other,
    })?;

    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    activity::record(
        pool.get_ref(),
        &creator,
        user.enterprise_id,
        ActivityAction::UserCreated,
        format!("{} account created for {}", user.role, email),
    )
    .await;

    info!(user_id = result.last_insert_id(), "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": result.last_insert_id()
    })))
}

async fn store_refresh_token(
    tx: &mut Transaction<'_, MySql>,
    claims: &Claims,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn session_for(user: &User) -> AppResult<AuthUser> {
    let role = Role::from_id(user.role_id)
        .ok_or_else(|| AppError::Internal(format!("user {} has unknown role", user.id)))?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email.clone(),
        role,
        enterprise_id: user.enterprise_id,
        employee_id: user.employee_id,
    })
}

async fn issue_pair(
    session: &AuthUser,
    pool: &MySqlPool,
    config: &Config,
    revoke_jti: Option<&str>,
) -> AppResult<TokenPair> {
    let token_error = |e: jsonwebtoken::errors::Error| AppError::Internal(e.to_string());

    let access_token = generate_access_token(session, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(session, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    let mut tx = pool.begin().await?;
    if let Some(jti) = revoke_jti {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(jti)
            .execute(&mut *tx)
            .await?;
    }
    store_refresh_token(&mut tx, &refresh_claims).await?;
    tx.commit().await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

const USER_COLUMNS: &str =
    "id, email, password, full_name, role_id, enterprise_id, employee_id, is_active";

async fn fetch_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

async fn fetch_user_by_id(pool: &MySqlPool, id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, body = TokenPair),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    user.validate()?;
    let email = user.email.trim().to_lowercase();

    debug!("Fetching user from database");

    let db_user = match fetch_user_by_email(pool.get_ref(), &email).await? {
        Some(u) => u,
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(AppError::Unauthorized("Account is disabled".into()));
    }

    debug!("Verifying password");
    let password = user.password.clone();
    let hashed = db_user.password.clone();
    if let Err(e) = web::block(move || verify_password(&password, &hashed)).await? {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let session = session_for(&db_user)?;
    let pair = issue_pair(&session, pool.get_ref(), &config, None).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(pair))
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    let live = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM refresh_tokens
            WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        )
        "#,
    )
    .bind(&claims.jti)
    .fetch_one(pool.get_ref())
    .await?;

    if !live {
        warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Err(unauthorized());
    }

    // role or enterprise may have changed since the token was issued
    let db_user = fetch_user_by_id(pool.get_ref(), claims.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    let session = session_for(&db_user)?;
    let pair = issue_pair(&session, pool.get_ref(), &config, Some(&claims.jti)).await?;

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Identity of the caller")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "email": auth.email,
        "role": auth.role,
        "enterprise_id": auth.enterprise_id,
        "employee_id": auth.employee_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator(role: Role, enterprise_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "root@paie.sn".into(),
            role,
            enterprise_id,
            employee_id: None,
        }
    }

    fn request(role: Role, enterprise_id: Option<u64>) -> RegisterReq {
        RegisterReq {
            email: "new@paie.sn".into(),
            password: "long-enough".into(),
            full_name: "New User".into(),
            role,
            enterprise_id,
            employee_id: None,
        }
    }

    #[test]
    fn test_super_admin_creates_anything() {
        let root = creator(Role::SuperAdmin, None);
        assert!(authorize_registration(&root, &request(Role::Admin, Some(2))).is_ok());
        assert!(authorize_registration(&root, &request(Role::SuperAdmin, None)).is_ok());
        assert!(authorize_registration(&root, &request(Role::SuperAdmin, Some(2))).is_err());
        assert!(authorize_registration(&root, &request(Role::Cashier, None)).is_err());
    }

    #[test]
    fn test_admin_limited_to_own_enterprise_staff() {
        let admin = creator(Role::Admin, Some(2));
        assert!(authorize_registration(&admin, &request(Role::Cashier, Some(2))).is_ok());
        assert!(authorize_registration(&admin, &request(Role::Employee, Some(2))).is_ok());
        assert!(matches!(
            authorize_registration(&admin, &request(Role::Cashier, Some(3))),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_registration(&admin, &request(Role::Admin, Some(2))),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_cashier_cannot_register() {
        let cashier = creator(Role::Cashier, Some(2));
        assert!(authorize_registration(&cashier, &request(Role::Employee, Some(2))).is_err());
    }

    #[test]
    fn test_register_payload_validation() {
        let mut req = request(Role::Cashier, Some(2));
        assert!(req.validate().is_ok());
        req.email = "not-an-email".into();
        assert!(req.validate().is_err());
        req.email = "ok@paie.sn".into();
        req.password = "short".into();
        assert!(req.validate().is_err());
    }
}
