use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::user::User;
use crate::store::Store;

pub mod attendance;
pub mod dashboard;
pub mod leave_request;
pub mod notification;
pub mod profile;
pub mod staff;

#[cfg(test)]
pub mod testing;

/// The account behind a token; deactivated or deleted accounts lose access.
pub async fn current_user(store: &dyn Store, auth: &AuthUser) -> Result<User, AppError> {
    match store.find_user(auth.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AppError::Unauthorized("Account is not active".to_string())),
    }
}

/// `{"message", "data"}` plus `warning` when a side effect failed.
pub fn with_warning<T: Serialize>(message: &str, data: &T, warning: Option<String>) -> Value {
    let mut body = json!({ "message": message, "data": data });
    if let Some(w) = warning {
        body["warning"] = Value::String(w);
    }
    body
}
