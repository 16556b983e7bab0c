use crate::{
    api::{attendance, dashboard, leave_request, notification, profile, staff},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Evidence travels base64-encoded inside JSON, so the body limit sits above 5 MB.
const JSON_LIMIT: usize = 8 * 1024 * 1024;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let reset_limiter = Arc::new(build_limiter(config.rate_reset_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.app_data(json_config());

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register/{token}")
                    .wrap(register_limiter.clone())
                    .route(web::get().to(handlers::invitation_details))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/password-reset")
                    .wrap(reset_limiter.clone())
                    .route(web::post().to(handlers::password_reset_request)),
            )
            .service(
                web::resource("/password-reset/{token}")
                    .wrap(reset_limiter.clone())
                    .route(web::post().to(handlers::password_reset_confirm)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile::get_profile))
                    .route(web::put().to(profile::update_profile)),
            )
            .service(
                web::scope("/dashboard")
                    .route("/admin", web::get().to(dashboard::admin_dashboard))
                    .route("/staff", web::get().to(dashboard::staff_dashboard)),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::attendance_report)))
                    .route("/mark", web::post().to(attendance::mark_attendance))
                    .route("/today", web::get().to(attendance::today_attendance))
                    .route("/mine", web::get().to(attendance::attendance_history))
                    .route("/manual", web::put().to(attendance::set_attendance))
                    .route("/export/{format}", web::get().to(attendance::export_attendance)),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::apply_leave)),
                    )
                    // literal segments before /{id}
                    .route("/mine", web::get().to(leave_request::my_leaves))
                    .route("/export/{format}", web::get().to(leave_request::export_leaves))
                    // /leave/{id}
                    .route("/{id}", web::get().to(leave_request::get_leave))
                    // /leave/{id}/approve
                    .route("/{id}/approve", web::put().to(leave_request::approve_leave))
                    // /leave/{id}/reject
                    .route("/{id}/reject", web::put().to(leave_request::reject_leave)),
            )
            .service(
                web::scope("/staff")
                    .service(web::resource("").route(web::get().to(staff::list_staff)))
                    .service(
                        web::resource("/invitations")
                            .route(web::get().to(staff::list_invitations))
                            .route(web::post().to(staff::send_invite)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(staff::get_staff))
                            .route(web::put().to(staff::edit_staff)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(web::resource("").route(web::get().to(notification::list_notifications)))
                    .route("/read-all", web::put().to(notification::mark_all_read))
                    .route("/{id}/read", web::put().to(notification::mark_read)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, rotated on every refresh)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with Authorization: Bearer refresh_token
//       └─ returns a new token pair; the old refresh token is revoked
