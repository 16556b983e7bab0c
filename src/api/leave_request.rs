use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::attendance::download;
use super::{current_user, with_warning};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::export::{self, ExportFormat};
use crate::mail::Mailer;
use crate::model::leave_request::{LeaveDecision, LeaveFilter, LeaveType};
use crate::service::leave::{self, LeaveApplication};
use crate::store::{Page, Store};
use crate::utils::evidence;

#[derive(Deserialize, ToSchema)]
pub struct ApplyLeave {
    #[schema(example = "casual")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-12", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: String,
    /// Original file name of the supporting document (required for sick leave)
    #[schema(example = "doctor_note.pdf")]
    pub evidence_name: Option<String>,
    /// File content, standard base64
    pub evidence_base64: Option<String>,
}

impl ApplyLeave {
    fn into_application(self) -> Result<LeaveApplication, AppError> {
        let evidence = match (self.evidence_name, self.evidence_base64) {
            (Some(name), Some(body)) if !body.trim().is_empty() => Some(evidence::decode(&name, &body)?),
            (None, Some(_)) => {
                return Err(AppError::field("evidence_name", "File name is required with evidence."));
            }
            _ => None,
        };
        Ok(LeaveApplication {
            leave_type: self.leave_type,
            start_date: self.start_date,
            end_date: self.end_date,
            reason: self.reason,
            evidence,
        })
    }
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = ApplyLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted",
            "data": {"id": 1, "staff_id": 7, "leave_type": "casual", "start_date": "2026-01-10", "end_date": "2026-01-12", "reason": "Family event", "evidence": null, "status": "pending", "applied_at": "2026-01-05T09:00:00Z"}
        })),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": {"end_date": ["End date cannot be earlier than start date."]}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    config: web::Data<Config>,
    payload: web::Json<ApplyLeave>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let staff = current_user(store.get_ref(), &auth).await?;
    let application = payload.into_inner().into_application()?;

    let (leave, outcome) = leave::apply(
        store.get_ref(),
        mailer.get_ref(),
        &config.media_root,
        &staff,
        application,
    )
    .await?;

    Ok(HttpResponse::Created().json(with_warning(
        "Leave request submitted",
        &leave,
        outcome.warning(),
    )))
}

/* =========================
Own leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/mine",
    params(Page),
    responses(
        (status = 200, description = "Own leave requests with counts", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff account required")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let filter = LeaveFilter {
        staff_id: Some(auth.user_id),
        ..Default::default()
    };
    let page = page.into_inner();
    let data = store.list_leaves(&filter, Some(page)).await?;
    let summary = store.leave_summary(&filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "data": data,
        "summary": summary,
        "page": page.number(),
        "per_page": page.size(),
        "total": summary.total,
    })))
}

/* =========================
Leave list (admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter, Page),
    responses(
        (status = 200, description = "Paginated leave requests", body = Object, example = json!({
            "data": [{"id": 1, "staff_id": 7, "username": "jdoe", "email": "john.doe@company.com", "leave_type": "sick", "start_date": "2026-01-01", "end_date": "2026-01-03", "reason": "Flu", "evidence": "leave_evidence/3f2a_note.pdf", "status": "pending", "applied_at": "2026-01-01T00:00:00Z"}],
            "summary": {"total": 1, "pending": 1, "approved": 0, "rejected": 0},
            "page": 1,
            "per_page": 10,
            "total": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    filter: web::Query<LeaveFilter>,
    page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let page = page.into_inner();
    let data = store.list_leaves(&filter, Some(page)).await?;
    let summary = store.leave_summary(&filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "data": data,
        "summary": summary,
        "page": page.number(),
        "per_page": page.size(),
        "total": summary.total,
    })))
}

/* =========================
Single leave request
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let leave = store
        .find_leave(id)
        .await?
        // staff only see their own requests; others look missing
        .filter(|l| auth.is_admin() || l.staff_id == auth.user_id)
        .ok_or_else(|| AppError::NotFound("Leave request not found".to_string()))?;
    Ok(HttpResponse::Ok().json(leave))
}

async fn decide(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    id: u64,
    decision: LeaveDecision,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let (leave, outcome) =
        leave::decide(store.get_ref(), mailer.get_ref(), auth.user_id, id, decision).await?;
    let message = format!("Leave request {}", leave.status);
    Ok(HttpResponse::Ok().json(with_warning(&message, &leave, outcome.warning())))
}

/* =========================
Approve leave
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave request approved",
            "data": {"id": 1, "status": "approved"},
            "warning": "Saved, but notification delivery failed: email to john.doe@company.com"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    decide(auth, store, mailer, path.into_inner(), LeaveDecision::Approve).await
}

/* =========================
Reject leave
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave rejected", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    decide(auth, store, mailer, path.into_inner(), LeaveDecision::Reject).await
}

/* =========================
Export leave history
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/export/{format}",
    params(
        ("format" = String, Path, description = "csv or xlsx"),
        LeaveFilter
    ),
    responses(
        (status = 200, description = "File download"),
        (status = 400, description = "Unsupported format"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn export_leaves(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    filter: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let format = ExportFormat::parse(&path)?;
    let rows = store.list_leaves(&filter, None).await?;
    let body = export::render(&export::leave_table(&rows), format, "Leave")?;
    tracing::info!(rows = rows.len(), %format, "Leave history exported");
    Ok(download(format, "leave_report", body))
}
