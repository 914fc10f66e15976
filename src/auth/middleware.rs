use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({
        "error": "UNAUTHORIZED",
        "message": message,
    }));
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => return Ok(reject(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(reject(req, "Authorization header must start with Bearer")),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Rejected token");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    let auth_user = match AuthUser::from_claims(claims) {
        Ok(user) => user,
        Err(e) => return Ok(reject(req, &e.to_string())),
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::model::role::Role;
    use actix_web::{App, middleware::from_fn, test, web};

    async fn me(auth: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(auth.email)
    }

    #[actix_web::test]
    async fn test_guards_protected_scope() {
        let config = Config::for_tests();
        let admin = AuthUser {
            user_id: 3,
            email: "admin@sen-services.sn".into(),
            role: Role::Admin,
            enterprise_id: Some(1),
            employee_id: None,
        };
        let token = generate_access_token(&admin, &config.jwt_secret, 60).unwrap();

        let app = test::init_service(
            App::new().app_data(Data::new(config)).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(me)),
            ),
        )
        .await;

        let ok = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, ok).await;
        assert_eq!(body.as_ref(), b"admin@sen-services.sn");

        let missing = test::TestRequest::get().uri("/api/me").to_request();
        assert_eq!(test::call_service(&app, missing).await.status(), 401);

        let garbage = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, garbage).await.status(), 401);

        let basic = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", "Basic Zm9vOmJhcg=="))
            .to_request();
        assert_eq!(test::call_service(&app, basic).await.status(), 401);
    }
}
