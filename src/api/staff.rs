use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::with_warning;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, FieldErrors};
use crate::mail::Mailer;
use crate::model::role::Role;
use crate::model::user::{StaffUpdate, User, is_valid_email};
use crate::service::invitation::{self, check_username};
use crate::store::Store;
use crate::utils::username_index::UsernameIndex;

#[derive(Deserialize, ToSchema)]
pub struct InviteReq {
    #[schema(example = "new.hire@company.com")]
    pub email: String,
}

#[derive(Deserialize, IntoParams)]
pub struct StaffQuery {
    /// Only list active accounts
    pub active_only: Option<bool>,
}

async fn find_staff(store: &dyn Store, id: u64) -> Result<User, AppError> {
    store
        .find_user(id)
        .await?
        .filter(User::is_staff)
        .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))
}

/// Emails a single-use registration link
#[utoipa::path(
    post,
    path = "/api/v1/staff/invitations",
    request_body = InviteReq,
    responses(
        (status = 201, description = "Invitation created", body = Object, example = json!({
            "message": "Invitation sent",
            "data": {"id": 1, "email": "new.hire@company.com", "is_used": false, "created_at": "2026-01-01T00:00:00Z"}
        })),
        (status = 400, description = "Invalid email"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered or invited")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn send_invite(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    config: web::Data<Config>,
    payload: web::Json<InviteReq>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let (invitation, warning) =
        invitation::invite(store.get_ref(), mailer.get_ref(), &config, &payload.email).await?;
    Ok(HttpResponse::Created().json(with_warning("Invitation sent", &invitation, warning)))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/invitations",
    responses(
        (status = 200, description = "All invitations, newest first", body = [Invitation]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn list_invitations(
    auth: AuthUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(store.list_invitations().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff",
    params(StaffQuery),
    responses(
        (status = 200, description = "Staff accounts by username", body = [User]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn list_staff(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<StaffQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let users = store
        .list_users(Role::Staff, query.active_only.unwrap_or(false))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "total": users.len(), "data": users })))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/{id}",
    params(("id" = u64, Path, description = "Staff user id")),
    responses(
        (status = 200, description = "Staff account", body = User),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn get_staff(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let user = find_staff(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Edits identity fields and the active flag of a staff account
#[utoipa::path(
    put,
    path = "/api/v1/staff/{id}",
    params(("id" = u64, Path, description = "Staff user id")),
    request_body = StaffUpdate,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Username or email taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn edit_staff(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    index: web::Data<UsernameIndex>,
    path: web::Path<u64>,
    payload: web::Json<StaffUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let current = find_staff(store.get_ref(), id).await?;

    let mut update = payload.into_inner();
    update.username = update.username.map(|u| u.trim().to_string());
    update.email = update.email.map(|e| e.trim().to_lowercase());

    let mut errors = FieldErrors::new();
    if let Some(username) = &update.username {
        check_username(&mut errors, username);
    }
    if let Some(email) = &update.email {
        if !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    errors.into_result()?;

    let renamed = update
        .username
        .as_deref()
        .filter(|u| !u.eq_ignore_ascii_case(&current.username))
        .map(str::to_string);
    if let Some(new_name) = &renamed {
        if !index.is_available(new_name, store.get_ref()).await {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
    }

    store.update_staff(id, &update).await?;
    if let Some(new_name) = &renamed {
        index.release(&current.username).await;
        index.mark_taken(new_name).await;
    }
    info!(staff_id = id, admin_id = auth.user_id, "Staff account updated");

    let user = find_staff(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestApp;
    use crate::model::role::Role;
    use crate::store::Store;
    use actix_web::http::{Method, StatusCode};
    use actix_web::test;
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn invite_then_duplicate_is_conflict() {
        let ctx = TestApp::new();
        let admin = ctx.store.seed_user("boss", Role::Admin, "x");
        let app = init_app!(ctx);

        let invite = || {
            ctx.as_user(Method::POST, "/api/v1/staff/invitations", &admin)
                .set_json(json!({"email": "new@staffhub.test"}))
                .to_request()
        };
        let resp = test::call_service(&app, invite()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = test::call_service(&app, invite()).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = ctx
            .as_user(Method::GET, "/api/v1/staff/invitations", &admin)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        // tokens never leave the server except by email
        assert!(body[0].get("token").is_none());
        assert_eq!(ctx.mailer.sent().len(), 1);
    }

    #[actix_web::test]
    async fn edit_staff_renames_and_deactivates() {
        let ctx = TestApp::new();
        let admin = ctx.store.seed_user("boss", Role::Admin, "x");
        let alice = ctx.store.seed_user("alice", Role::Staff, "x");
        ctx.store.seed_user("bob", Role::Staff, "x");
        ctx.index.mark_taken("bob").await;
        let app = init_app!(ctx);
        let uri = format!("/api/v1/staff/{}", alice.id);

        let req = ctx
            .as_user(Method::PUT, &uri, &admin)
            .set_json(json!({"username": "bob"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = ctx
            .as_user(Method::PUT, &uri, &admin)
            .set_json(json!({"username": "alice.w", "is_active": false}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["username"], "alice.w");
        assert_eq!(body["is_active"], false);

        let stored = ctx.store.find_user(alice.id).await.unwrap().unwrap();
        assert!(!stored.is_active);

        // a deactivated account can no longer use its token
        let req = ctx.as_user(Method::GET, "/api/v1/profile", &stored).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn admins_are_not_editable_as_staff() {
        let ctx = TestApp::new();
        let admin = ctx.store.seed_user("boss", Role::Admin, "x");
        let app = init_app!(ctx);

        let uri = format!("/api/v1/staff/{}", admin.id);
        let req = ctx
            .as_user(Method::PUT, &uri, &admin)
            .set_json(json!({"email": "bad"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
