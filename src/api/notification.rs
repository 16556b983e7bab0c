use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::store::Store;

#[derive(Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// How many to return (default 10, max 100)
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Most recent notifications and unread count", body = Object, example = json!({
            "unread": 1,
            "data": [{"id": 3, "recipient_id": 7, "sender_id": 1, "subject": "Leave request approved", "message": "Your casual leave from 2026-01-10 to 2026-01-12 has been approved.", "is_read": false, "created_at": "2026-01-06T10:00:00Z"}]
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let data = store.list_notifications(auth.user_id, limit).await?;
    let unread = store.count_unread(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "unread": unread, "data": data })))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = u64, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    if !store
        .mark_notification_read(path.into_inner(), auth.user_id)
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/read-all",
    responses(
        (status = 200, description = "Number of notifications updated", body = Object, example = json!({"updated": 4})),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_all_read(
    auth: AuthUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let updated = store.mark_all_read(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestApp;
    use crate::model::notification::NewNotification;
    use crate::model::role::Role;
    use crate::store::Store;
    use actix_web::http::{Method, StatusCode};
    use actix_web::test;
    use serde_json::Value;

    #[actix_web::test]
    async fn recipients_only_touch_their_own() {
        let ctx = TestApp::new();
        let alice = ctx.store.seed_user("alice", Role::Staff, "x");
        let bob = ctx.store.seed_user("bob", Role::Staff, "x");
        let mut ids = Vec::new();
        for subject in ["one", "two"] {
            let n = ctx
                .store
                .create_notification(NewNotification {
                    recipient_id: alice.id,
                    sender_id: None,
                    subject: subject.into(),
                    message: "m".into(),
                })
                .await
                .unwrap();
            ids.push(n.id);
        }
        let app = init_app!(ctx);

        let uri = format!("/api/v1/notifications/{}/read", ids[0]);
        let req = ctx.as_user(Method::PUT, &uri, &bob).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = ctx.as_user(Method::PUT, &uri, &alice).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = ctx.as_user(Method::GET, "/api/v1/notifications", &alice).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unread"], 1);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let req = ctx
            .as_user(Method::PUT, "/api/v1/notifications/read-all", &alice)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updated"], 1);
    }
}
