use actix_web::{HttpResponse, web};
use chrono::Utc;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::service::attendance::local_today;
use crate::service::dashboard;
use crate::store::Store;

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/admin",
    responses(
        (status = 200, description = "Today's counts and a 7-day trend", body = AdminDashboard),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn admin_dashboard(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let today = local_today(Utc::now(), config.utc_offset);
    Ok(HttpResponse::Ok().json(dashboard::admin(store.get_ref(), today).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/staff",
    responses(
        (status = 200, description = "Own attendance and leave overview", body = StaffDashboard),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn staff_dashboard(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let today = local_today(Utc::now(), config.utc_offset);
    Ok(HttpResponse::Ok().json(dashboard::staff(store.get_ref(), auth.user_id, today).await?))
}
