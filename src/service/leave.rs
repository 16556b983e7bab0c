use actix_web::web;
use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use super::notify::{self, Dispatch};
use crate::error::{AppError, FieldErrors};
use crate::mail::Mailer;
use crate::model::leave_request::{LeaveDecision, LeaveRequest, LeaveStatus, LeaveType, NewLeave};
use crate::model::role::Role;
use crate::model::user::User;
use crate::store::Store;
use crate::utils::evidence::{self, EvidenceFile};

/// A validated-shape leave submission; evidence is already decoded.
#[derive(Debug)]
pub struct LeaveApplication {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub evidence: Option<EvidenceFile>,
}

fn validate(app: &LeaveApplication) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if app.end_date < app.start_date {
        errors.add("end_date", "End date cannot be earlier than start date.");
    }
    if app.reason.trim().is_empty() {
        errors.add("reason", "Reason is required.");
    }
    if app.leave_type.requires_evidence() && app.evidence.is_none() {
        errors.add("evidence", "Evidence is required for sick leave.");
    }
    errors.into_result()
}

async fn store_evidence(media_root: &str, file: EvidenceFile) -> Result<String, AppError> {
    let root = media_root.to_string();
    web::block(move || evidence::save(&root, file))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "Failed to store leave evidence");
            AppError::Internal(e.to_string())
        })
}

async fn discard_evidence(media_root: &str, relative: &str) {
    let root = media_root.to_string();
    let path = relative.to_string();
    match web::block(move || evidence::remove(&root, &path)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, path = relative, "Failed to remove orphaned evidence"),
        Err(e) => warn!(error = %e, path = relative, "Failed to remove orphaned evidence"),
    }
}

/// Files a pending request and tells every active admin about it.
#[instrument(skip(store, mailer, media_root, staff, app), fields(staff_id = staff.id))]
pub async fn apply(
    store: &dyn Store,
    mailer: &dyn Mailer,
    media_root: &str,
    staff: &User,
    app: LeaveApplication,
) -> Result<(LeaveRequest, Dispatch), AppError> {
    validate(&app)?;

    let evidence = match app.evidence {
        Some(file) => Some(store_evidence(media_root, file).await?),
        None => None,
    };

    let created = store
        .create_leave(NewLeave {
            staff_id: staff.id,
            leave_type: app.leave_type,
            start_date: app.start_date,
            end_date: app.end_date,
            reason: app.reason.trim().to_string(),
            evidence: evidence.clone(),
        })
        .await;
    let leave = match created {
        Ok(leave) => leave,
        Err(e) => {
            if let Some(path) = &evidence {
                discard_evidence(media_root, path).await;
            }
            return Err(e.into());
        }
    };
    info!(leave_id = leave.id, leave_type = %leave.leave_type, "Leave request submitted");

    let admins = store.list_users(Role::Admin, true).await;
    let message = format!(
        "{} applied for {} from {} to {} ({} day(s)).\nReason: {}",
        staff.display_name(),
        leave.leave_type.label(),
        leave.start_date,
        leave.end_date,
        leave.days(),
        leave.reason
    );
    let outcome = notify::dispatch_to(
        store,
        mailer,
        Some(staff.id),
        admins,
        "New leave request",
        &message,
    )
    .await;

    Ok((leave, outcome))
}

/// Moves a pending request to its terminal state and notifies the requester.
///
/// The store's conditional update decides races: when two admins act at
/// once exactly one transition lands and the other gets a conflict.
#[instrument(skip(store, mailer))]
pub async fn decide(
    store: &dyn Store,
    mailer: &dyn Mailer,
    admin_id: u64,
    leave_id: u64,
    decision: LeaveDecision,
) -> Result<(LeaveRequest, Dispatch), AppError> {
    let leave = store
        .find_leave(leave_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Leave request not found".to_string()))?;

    let next = leave
        .status
        .apply(decision)
        .map_err(|e| AppError::Conflict(capitalize(&e.to_string())))?;

    if !store.transition_leave(leave_id, LeaveStatus::Pending, next).await? {
        let current = store
            .find_leave(leave_id)
            .await?
            .map(|l| l.status)
            .unwrap_or(next);
        return Err(AppError::Conflict(format!("Leave request is already {}", current)));
    }
    info!(leave_id, status = %next, "Leave request decided");

    let leave = LeaveRequest { status: next, ..leave };

    let recipients = store
        .find_user(leave.staff_id)
        .await
        .map(|user| user.into_iter().collect());
    let subject = format!("Leave request {}", next);
    let message = format!(
        "Your {} request from {} to {} has been {}.",
        leave.leave_type.label(),
        leave.start_date,
        leave.end_date,
        next
    );
    let outcome =
        notify::dispatch_to(store, mailer, Some(admin_id), recipients, &subject, &message).await;

    Ok((leave, outcome))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
