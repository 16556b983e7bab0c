use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::{Value, json};

/// Decodes the bearer token into an [`AuthUser`], or the 401 body to send back.
fn authenticate(req: &ServiceRequest, config: &Config) -> Result<AuthUser, Value> {
    let header_value = match req.headers().get("Authorization") {
        Some(h) => h
            .to_str()
            .map_err(|_| json!({"message": "Invalid Authorization header encoding"}))?,
        None => return Err(json!({"message": "Missing Authorization header"})),
    };

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| json!({"message": "Authorization header must start with Bearer"}))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|e| json!({"message": "Invalid or expired token", "details": e}))?;

    AuthUser::from_claims(claims).map_err(|e| json!({"message": e.to_string()}))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    match authenticate(&req, &config) {
        Ok(auth_user) => {
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(body) => {
            let resp = HttpResponse::Unauthorized().json(body);
            Ok(req.into_response(resp.map_into_boxed_body()))
        }
    }
}
