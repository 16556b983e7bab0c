use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// Requests allowed per email inside [`ATTEMPT_WINDOW_MINUTES`].
pub const MAX_ATTEMPTS: i64 = 3;
pub const ATTEMPT_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: u64,
    pub user_id: u64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

/// Start of the trailing window that rate-limits reset requests.
pub fn attempt_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(ATTEMPT_WINDOW_MINUTES)
}

/// Reset tokens are stored hashed; only the emailed link carries the raw value.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
