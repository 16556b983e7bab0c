use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use crate::auth::password::{check_new_password, hash_password};
use crate::config::Config;
use crate::error::{AppError, FieldErrors};
use crate::mail::{Mailer, OutgoingEmail};
use crate::model::password_reset::{MAX_ATTEMPTS, attempt_window_start, hash_token};
use crate::model::user::User;
use crate::store::Store;
use crate::utils::token::url_safe_token;

pub const INVALID_TOKEN: &str = "Invalid or expired reset token";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issues a reset link when the email belongs to an active account.
///
/// The caller cannot tell whether the address exists: the only visible
/// outcomes are success, a validation error and the rate limit.
#[instrument(skip(store, mailer, config))]
pub async fn request(
    store: &dyn Store,
    mailer: &dyn Mailer,
    config: &Config,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::field("email", "Email is required."));
    }

    let attempts = store
        .count_reset_attempts_since(&email, attempt_window_start(now))
        .await?;
    if attempts >= MAX_ATTEMPTS {
        warn!(attempts, "Password reset rate limit reached");
        return Err(AppError::TooManyRequests(
            "Too many password reset requests. Please try again later.".to_string(),
        ));
    }
    store.record_reset_attempt(&email, now).await?;

    let user = match store.find_user_by_email(&email).await? {
        Some(user) if user.is_active => user,
        _ => {
            info!("Password reset requested for unknown or inactive email");
            return Ok(());
        }
    };

    let token = url_safe_token();
    let expires_at = now + Duration::hours(config.password_reset_expiry_hours);
    store
        .create_reset_token(user.id, &hash_token(&token), expires_at)
        .await?;

    let link = config.site_link(&format!("reset-password/{}", token));
    let body = format!(
        "Hi {},\n\nUse the link below to reset your password. It expires in {} hour(s).\n\n{}\n\nIf you did not request this, you can ignore this email.",
        user.display_name(),
        config.password_reset_expiry_hours,
        link
    );
    let email = OutgoingEmail::new(vec![user.email.clone()], "Password reset", body).with_html_from_text();
    // the token is stored either way; a failed send only means the user asks again
    if let Err(e) = mailer.send(&email).await {
        warn!(error = %e, user_id = user.id, "Failed to send password reset email");
    } else {
        info!(user_id = user.id, "Password reset email sent");
    }
    Ok(())
}

/// Sets a new password through a reset token and signs the user out everywhere.
#[instrument(skip_all)]
pub async fn confirm(
    store: &dyn Store,
    token: &str,
    new_password: &str,
    confirm_password: &str,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let record = store
        .find_reset_token(&hash_token(token))
        .await?
        .filter(|t| t.is_usable(now))
        .ok_or_else(|| AppError::BadRequest(INVALID_TOKEN.to_string()))?;

    let mut errors = FieldErrors::new();
    check_new_password(&mut errors, "new_password", new_password, confirm_password);
    errors.into_result()?;

    let password_hash = hash_password(new_password).map_err(|e| AppError::Internal(e.to_string()))?;
    if !store
        .consume_reset_token(record.id, record.user_id, &password_hash, now)
        .await?
    {
        return Err(AppError::BadRequest(INVALID_TOKEN.to_string()));
    }

    let revoked = store.revoke_user_refresh_tokens(record.user_id).await?;
    info!(user_id = record.user_id, revoked, "Password reset completed");

    store
        .find_user(record.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
