use crate::config::Config;
use crate::error::AppError;
use crate::{model::role::Role, models::{Claims, TokenType}};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::decode;
use jsonwebtoken::{DecodingKey, Validation};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".to_string()));
        }
        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".to_string()))?;
        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }

    fn from_header(req: &HttpRequest) -> Result<Self, AppError> {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| AppError::Internal("Config missing".to_string()))?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

        Self::from_claims(data.claims)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied: admin only".to_string()))
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role == Role::Staff {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Access denied: staff account required".to_string(),
            ))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the auth middleware already decoded the token on protected routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(Self::from_header(req))
    }
}
