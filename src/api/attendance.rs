use actix_web::http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::export::{self, ExportFormat};
use crate::model::attendance::{AttendanceFilter, AttendanceStatus};
use crate::service::attendance::{check_in, local_today, set_manual};
use crate::store::{Page, Store};

#[derive(Deserialize, ToSchema)]
pub struct ManualAttendance {
    #[schema(example = 7)]
    pub staff_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "absent")]
    pub status: AttendanceStatus,
}

/// Marks today's attendance for the signed-in staff member
#[utoipa::path(
    post,
    path = "/api/v1/attendance/mark",
    responses(
        (status = 200, description = "Attendance recorded", body = Object, example = json!({
            "message": "Attendance marked as present",
            "data": {"id": 1, "staff_id": 7, "date": "2026-01-05", "status": "present", "timestamp": "2026-01-05T07:02:11Z"}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let record = check_in(
        store.get_ref(),
        auth.user_id,
        Utc::now(),
        config.utc_offset,
        config.attendance_cutoff,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Attendance marked as {}", record.status),
        "data": record,
    })))
}

/// Today's record for the signed-in staff member, or null
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's record", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let today = local_today(Utc::now(), config.utc_offset);
    let record = store.find_attendance(auth.user_id, today).await?;
    Ok(HttpResponse::Ok().json(json!({ "date": today, "data": record })))
}

/// Own attendance history, newest first, with status counts
#[utoipa::path(
    get,
    path = "/api/v1/attendance/mine",
    params(Page),
    responses(
        (status = 200, description = "Attendance history", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_history(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let filter = AttendanceFilter {
        staff_id: Some(auth.user_id),
        ..Default::default()
    };
    let page = page.into_inner();
    let data = store.list_attendance(&filter, Some(page)).await?;
    let summary = store.attendance_summary(&filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "data": data,
        "summary": summary,
        "page": page.number(),
        "per_page": page.size(),
        "total": summary.total,
    })))
}

/// Filtered attendance report across all staff
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceFilter, Page),
    responses(
        (status = 200, description = "Attendance report", body = Object, example = json!({
            "data": [{"id": 1, "staff_id": 7, "username": "jdoe", "email": "john.doe@company.com", "date": "2026-01-05", "status": "late", "timestamp": "2026-01-05T07:42:00Z"}],
            "summary": {"total": 1, "present": 0, "absent": 0, "late": 1},
            "page": 1,
            "per_page": 10,
            "total": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_report(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    filter: web::Query<AttendanceFilter>,
    page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let page = page.into_inner();
    let data = store.list_attendance(&filter, Some(page)).await?;
    let summary = store.attendance_summary(&filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "data": data,
        "summary": summary,
        "page": page.number(),
        "per_page": page.size(),
        "total": summary.total,
    })))
}

/// Sets any status for a staff member on a given day
#[utoipa::path(
    put,
    path = "/api/v1/attendance/manual",
    request_body = ManualAttendance,
    responses(
        (status = 200, description = "Attendance saved", body = Object),
        (status = 400, description = "Not a staff account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Staff member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn set_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<ManualAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let record = set_manual(
        store.get_ref(),
        payload.staff_id,
        payload.date,
        payload.status,
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance saved", "data": record })))
}

/// Downloads the filtered report as CSV or XLSX
#[utoipa::path(
    get,
    path = "/api/v1/attendance/export/{format}",
    params(
        ("format" = String, Path, description = "csv or xlsx"),
        AttendanceFilter
    ),
    responses(
        (status = 200, description = "File download"),
        (status = 400, description = "Unsupported format"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn export_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    filter: web::Query<AttendanceFilter>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let format = ExportFormat::parse(&path)?;
    let rows = store.list_attendance(&filter, None).await?;
    let body = export::render(&export::attendance_table(&rows), format, "Attendance")?;
    tracing::info!(rows = rows.len(), %format, "Attendance exported");
    Ok(download(format, "attendance_report", body))
}

/// Attachment response shared by both export endpoints.
pub(crate) fn download(format: ExportFormat, stem: &str, body: Vec<u8>) -> HttpResponse {
    let content_type = format
        .content_type()
        .parse()
        .map(ContentType)
        .unwrap_or_else(|_| ContentType::octet_stream());
    HttpResponse::Ok()
        .insert_header(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format.file_name(stem))],
        })
        .body(body)
}
