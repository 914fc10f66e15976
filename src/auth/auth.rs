use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Claims, TokenType};
use crate::{auth::jwt::verify_token, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,

    /// Absent only for SUPER_ADMIN
    pub enterprise_id: Option<u64>,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Access-token claims only; refresh tokens never authenticate a request.
    pub fn from_claims(claims: Claims) -> AppResult<Self> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        if !role.is_global() && claims.enterprise_id.is_none() {
            return Err(AppError::Unauthorized("Token is not bound to an enterprise".into()));
        }

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            enterprise_id: claims.enterprise_id,
            employee_id: claims.employee_id,
        })
    }

    fn from_header(req: &HttpRequest) -> AppResult<Self> {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| AppError::Internal("Config missing".into()))?;

        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

        Self::from_claims(claims)
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        ready(Self::from_header(req))
    }
}

impl AuthUser {
    pub fn require_roles(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    pub fn require_super_admin(&self) -> AppResult<()> {
        self.require_roles(&[Role::SuperAdmin])
    }

    /// SUPER_ADMIN or ADMIN
    pub fn require_admin(&self) -> AppResult<()> {
        self.require_roles(&[Role::SuperAdmin, Role::Admin])
    }

    /// SUPER_ADMIN, ADMIN or CASHIER
    pub fn require_staff(&self) -> AppResult<()> {
        self.require_roles(&[Role::SuperAdmin, Role::Admin, Role::Cashier])
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }

    /// Fails unless the caller may act on `enterprise_id`.
    pub fn ensure_enterprise(&self, enterprise_id: u64) -> AppResult<()> {
        if self.role.is_global() || self.enterprise_id == Some(enterprise_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Resource belongs to another enterprise".into()))
        }
    }

    /// Resolves the enterprise filter of a list/aggregate query: SUPER_ADMIN
    /// may ask for any enterprise (or all of them), everybody else is pinned to
    /// their own.
    pub fn scope(&self, requested: Option<u64>) -> AppResult<Option<u64>> {
        if self.role.is_global() {
            return Ok(requested);
        }
        if let Some(id) = requested {
            self.ensure_enterprise(id)?;
        }
        Ok(self.enterprise_id)
    }

    /// EMPLOYEE callers may only touch their own employee record.
    pub fn ensure_employee(&self, employee_id: u64) -> AppResult<()> {
        if self.is_employee() && self.employee_id != Some(employee_id) {
            return Err(AppError::Forbidden("Employees can only access their own records".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::{HttpResponse, test, web, App};

    fn user(role: Role, enterprise_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "x@paie.sn".into(),
            role,
            enterprise_id,
            employee_id: None,
        }
    }

    #[core::prelude::v1::test]
    fn test_role_gates() {
        assert!(user(Role::SuperAdmin, None).require_admin().is_ok());
        assert!(user(Role::Admin, Some(1)).require_admin().is_ok());
        assert!(user(Role::Cashier, Some(1)).require_admin().is_err());
        assert!(user(Role::Cashier, Some(1)).require_staff().is_ok());
        assert!(user(Role::Employee, Some(1)).require_staff().is_err());
        assert!(user(Role::Admin, Some(1)).require_super_admin().is_err());
    }

    #[core::prelude::v1::test]
    fn test_enterprise_scope() {
        let admin = user(Role::Admin, Some(4));
        assert_eq!(admin.scope(None).ok(), Some(Some(4)));
        assert_eq!(admin.scope(Some(4)).ok(), Some(Some(4)));
        assert!(matches!(admin.scope(Some(5)), Err(AppError::Forbidden(_))));
        assert!(admin.ensure_enterprise(5).is_err());

        let root = user(Role::SuperAdmin, None);
        assert_eq!(root.scope(None).ok(), Some(None));
        assert_eq!(root.scope(Some(5)).ok(), Some(Some(5)));
        assert!(root.ensure_enterprise(5).is_ok());
    }

    #[core::prelude::v1::test]
    fn test_employee_sees_only_self() {
        let mut me = user(Role::Employee, Some(1));
        me.employee_id = Some(9);
        assert!(me.ensure_employee(9).is_ok());
        assert!(me.ensure_employee(10).is_err());
        assert!(user(Role::Admin, Some(1)).ensure_employee(10).is_ok());
    }

    async fn whoami(auth: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(auth.role.to_string())
    }

    #[actix_web::test]
    async fn test_extractor_reads_bearer_token() {
        let config = Config::for_tests();
        let token =
            generate_access_token(&user(Role::Cashier, Some(2)), &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"CASHIER");

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let config = Config::for_tests();
        let (token, _) =
            generate_refresh_token(&user(Role::Admin, Some(2)), &config.jwt_secret, 60).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }
}
