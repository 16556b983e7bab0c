use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::AppError,
    mail::Mailer,
    model::user::User,
    models::{LoginReqDto, PasswordResetConfirmDto, PasswordResetReqDto, RegisterReqDto, TokenPair, TokenType},
    service::{invitation, password_reset},
    store::Store,
    utils::username_index::UsernameIndex,
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::{debug, error, info, instrument};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Signs a fresh access/refresh pair and records the refresh token's jti.
async fn issue_tokens(store: &dyn Store, config: &Config, user: &User) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(
        user.id,
        user.username.clone(),
        user.role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        user.username.clone(),
        user.role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let expires_at = Utc
        .timestamp_opt(refresh_claims.exp as i64, 0)
        .single()
        .ok_or_else(|| AppError::Internal("refresh expiry out of range".to_string()))?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store
        .store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials or disabled account"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username or password required".to_string()));
    }

    let account = match store.find_user_by_username(user.username.trim()).await? {
        Some(account) => account,
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    if let Err(e) = verify_password(&user.password, &account.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if !account.is_active {
        info!(user_id = account.id, "Login refused: account disabled");
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    let tokens = issue_tokens(store.get_ref(), &config, &account).await?;

    // last_login_at is best effort
    if let Err(e) = store.touch_last_login(account.id, Utc::now()).await {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = account.id, role = %account.role, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates the refresh token sent as the bearer credential
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("No token".to_string()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".to_string()));
    }

    // revoke first: a replayed token finds nothing to consume
    let user_id = store
        .consume_refresh_token(&claims.jti, Utc::now())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Refresh token revoked".to_string()))?;

    let user = store
        .find_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is not active".to_string()))?;

    let tokens = issue_tokens(store.get_ref(), &config, &user).await?;
    debug!(user_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the refresh token; always succeeds
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(claims)) if claims.token_type == TokenType::Refresh => claims,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = store.consume_refresh_token(&claims.jti, Utc::now()).await {
        error!(error = %e, "Failed to revoke refresh token");
    }
    HttpResponse::NoContent().finish()
}

/// Email address an open invitation was sent to
#[utoipa::path(
    get,
    path = "/auth/register/{token}",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Invitation is open", body = Object, example = json!({"email": "new.hire@company.com"})),
        (status = 404, description = "Invalid or already used invitation")
    ),
    tag = "Auth"
)]
pub async fn invitation_details(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invitation = invitation::open_invitation(store.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "email": invitation.email })))
}

/// Creates a staff account from an invitation
#[utoipa::path(
    post,
    path = "/auth/register/{token}",
    params(("token" = String, Path, description = "Invitation token")),
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "Account created", body = Object),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Invalid or already used invitation"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    store: web::Data<dyn Store>,
    index: web::Data<UsernameIndex>,
    path: web::Path<String>,
    payload: web::Json<RegisterReqDto>,
) -> Result<HttpResponse, AppError> {
    let user = invitation::register(store.get_ref(), &index, &path, &payload).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Account created. You can now log in.",
        "data": user,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetReqDto,
    responses(
        (status = 200, description = "Same response whether or not the email exists", body = Object, example = json!({
            "message": "If an account exists for that email, a reset link has been sent."
        })),
        (status = 400, description = "Email missing"),
        (status = 429, description = "Too many reset requests for this email")
    ),
    tag = "Auth"
)]
pub async fn password_reset_request(
    store: web::Data<dyn Store>,
    mailer: web::Data<dyn Mailer>,
    config: web::Data<Config>,
    payload: web::Json<PasswordResetReqDto>,
) -> Result<HttpResponse, AppError> {
    password_reset::request(
        store.get_ref(),
        mailer.get_ref(),
        &config,
        &payload.email,
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "If an account exists for that email, a reset link has been sent."
    })))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/{token}",
    params(("token" = String, Path, description = "Token from the reset email")),
    request_body = PasswordResetConfirmDto,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password has been reset. Please log in."
        })),
        (status = 400, description = "Invalid or expired token, or password rules not met")
    ),
    tag = "Auth"
)]
pub async fn password_reset_confirm(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    payload: web::Json<PasswordResetConfirmDto>,
) -> Result<HttpResponse, AppError> {
    password_reset::confirm(
        store.get_ref(),
        &path,
        &payload.new_password,
        &payload.confirm_password,
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password has been reset. Please log in." })))
}
