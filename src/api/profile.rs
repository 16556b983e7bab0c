use actix_web::{HttpResponse, web};

use super::current_user;
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::user::ProfileUpdate;
use crate::store::Store;

#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "The signed-in account", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_profile(auth: AuthUser, store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let user = current_user(store.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Names only; the email address is managed by admins
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(store.get_ref(), &auth).await?;
    let update = ProfileUpdate {
        first_name: payload.first_name.as_ref().map(|s| s.trim().to_string()),
        last_name: payload.last_name.as_ref().map(|s| s.trim().to_string()),
    };
    store.update_profile(user.id, &update).await?;
    let user = current_user(store.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestApp;
    use crate::model::role::Role;
    use actix_web::http::Method;
    use actix_web::test;
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn email_is_not_editable_here() {
        let ctx = TestApp::new();
        let alice = ctx.store.seed_user("alice", Role::Staff, "x");
        let app = init_app!(ctx);

        let req = ctx
            .as_user(Method::PUT, "/api/v1/profile", &alice)
            .set_json(json!({"first_name": " Alice ", "email": "evil@staffhub.test"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["first_name"], "Alice");
        assert_eq!(body["email"], "alice@staffhub.test");
        assert!(body.get("password_hash").is_none());
    }
}
