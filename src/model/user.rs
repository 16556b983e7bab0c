use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "username": "jdoe",
    "email": "john.doe@company.com",
    "role": "staff",
    "first_name": "John",
    "last_name": "Doe",
    "is_active": true,
    "created_at": "2026-01-01T00:00:00Z",
    "last_login_at": null
}))]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", falling back to the username when no name is set.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Insert payload for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    #[schema(example = "John")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
}

/// Fields an admin may change on a staff account.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StaffUpdate {
    #[schema(example = "jdoe")]
    pub username: Option<String>,
    #[schema(example = "john.doe@company.com")]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

/// Minimal shape check used by invitation and staff edit forms.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}
