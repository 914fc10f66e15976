use crate::{
    api::{
        attendance, dashboard, day_summary, employee, enterprise, pay_run, payment, payslip, user,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter settings, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    register: LimiterConfig,
    refresh: LimiterConfig,
    protected: LimiterConfig,
}

fn limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let requests_per_min = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(60_000 / u64::from(requests_per_min))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests/min"))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: limiter(config.rate_login_per_min)?,
            register: limiter(config.rate_register_per_min)?,
            refresh: limiter(config.rate_refresh_per_min)?,
            protected: limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limits: &RateLimits) {
    // Token endpoints
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(Governor::new(&limits.register))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limits.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limits.protected))
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/enterprises")
                    .service(
                        web::resource("")
                            .route(web::post().to(enterprise::create_enterprise))
                            .route(web::get().to(enterprise::list_enterprises)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(enterprise::get_enterprise))
                            .route(web::put().to(enterprise::update_enterprise))
                            .route(web::delete().to(enterprise::delete_enterprise)),
                    )
                    .service(
                        web::resource("/{id}/toggle")
                            .route(web::patch().to(enterprise::toggle_enterprise)),
                    ),
            )
            .service(
                web::scope("/users")
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    .service(web::resource("/{id}/toggle").route(web::patch().to(user::toggle_user))),
            )
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/toggle")
                            .route(web::patch().to(employee::toggle_employee)),
                    ),
            )
            .service(
                web::scope("/payruns")
                    .service(
                        web::resource("")
                            .route(web::post().to(pay_run::create_pay_run))
                            .route(web::get().to(pay_run::list_pay_runs)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(pay_run::get_pay_run))
                            .route(web::put().to(pay_run::update_pay_run))
                            .route(web::delete().to(pay_run::delete_pay_run)),
                    )
                    .service(web::resource("/{id}/approve").route(web::post().to(pay_run::approve_pay_run)))
                    .service(web::resource("/{id}/close").route(web::post().to(pay_run::close_pay_run)))
                    .service(
                        web::resource("/{id}/payslips/documents")
                            .route(web::get().to(payslip::pay_run_documents)),
                    ),
            )
            .service(
                web::scope("/payslips")
                    .service(web::resource("").route(web::get().to(payslip::list_payslips)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payslip::get_payslip))
                            .route(web::put().to(payslip::update_payslip))
                            .route(web::delete().to(payslip::delete_payslip)),
                    )
                    .service(
                        web::resource("/{id}/document")
                            .route(web::get().to(payslip::payslip_document)),
                    ),
            )
            .service(
                web::scope("/payments")
                    .service(
                        web::resource("")
                            .route(web::post().to(payment::create_payment))
                            .route(web::get().to(payment::list_payments)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payment::get_payment))
                            .route(web::put().to(payment::update_payment))
                            .route(web::delete().to(payment::delete_payment)),
                    )
                    .service(
                        web::resource("/{id}/receipt")
                            .route(web::get().to(payment::payment_receipt_document)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::create_attendance))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    // fixed segments before /{id}
                    .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/break-start").route(web::post().to(attendance::break_start)))
                    .service(web::resource("/break-end").route(web::post().to(attendance::break_end)))
                    .service(web::resource("/bulk").route(web::post().to(attendance::bulk_create_attendance)))
                    .service(web::resource("/report").route(web::get().to(attendance::monthly_report)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::post().to(attendance::approve_attendance)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::post().to(attendance::reject_attendance)),
                    )
                    .service(
                        web::resource("/{id}/audit")
                            .route(web::get().to(attendance::attendance_audit)),
                    ),
            )
            .service(
                web::scope("/day-summaries")
                    .service(web::resource("").route(web::get().to(day_summary::list_summaries)))
                    .service(
                        web::resource("/generate")
                            .route(web::post().to(day_summary::generate_summaries)),
                    )
                    .service(web::resource("/{id}/lock").route(web::post().to(day_summary::lock_summary)))
                    .service(
                        web::resource("/{id}/unlock")
                            .route(web::post().to(day_summary::unlock_summary)),
                    ),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/kpis").route(web::get().to(dashboard::kpis)))
                    .service(web::resource("/evolution").route(web::get().to(dashboard::evolution)))
                    .service(web::resource("/upcoming").route(web::get().to(dashboard::upcoming)))
                    .service(web::resource("/global").route(web::get().to(dashboard::global_stats)))
                    .service(web::resource("/activities").route(web::get().to(dashboard::activities))),
            ),
    );
}

// LOGIN
//  ├─ access_token
//  └─ refresh_token (stored, rotated on /auth/refresh)

// API REQUEST
//  └─ Authorization: Bearer access_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_build_from_config() {
        let mut config = Config::for_tests();
        config.rate_login_per_min = 0;
        assert!(RateLimits::from_config(&config).is_ok());
    }
}
