use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Actor, DomainError};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Hairdresser,
    Salon,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Hairdresser => "hairdresser",
            Role::Salon => "salon",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "hairdresser" => Ok(Role::Hairdresser),
            "salon" => Ok(Role::Salon),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Internal(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

pub fn issue_token(user_id: Uuid, role: Role, secret: &str, expires_in_secs: i64) -> Result<String, AppError> {
    let exp = (Utc::now().timestamp() + expires_in_secs).max(0) as usize;
    let claims = Claims {
        sub: user_id,
        role,
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        let message = match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => "expired token",
            _ => "invalid token",
        };
        AppError::Unauthorized(message.to_string())
    })
}

/// Caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Maps the caller onto a booking actor. Hairdressers and salons act
    /// through their hairdresser profile.
    pub async fn actor(&self, state: &AppState) -> Result<Actor, AppError> {
        match self.role {
            Role::Admin => Ok(Actor::Admin),
            Role::Client => Ok(Actor::Client(self.user_id)),
            Role::Hairdresser | Role::Salon => {
                let profile = state.hairdressers.profile_for_user(self.user_id).await?;
                Ok(Actor::Hairdresser(profile.id))
            }
        }
    }

    /// Hairdresser profile id of the caller, or 403.
    pub async fn hairdresser_id(&self, state: &AppState) -> Result<Uuid, AppError> {
        match self.actor(state).await? {
            Actor::Hairdresser(id) => Ok(id),
            _ => Err(DomainError::Forbidden("hairdresser role required".to_string()).into()),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
        let claims = decode_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

/// Optional authentication: no header means anonymous, a bad token is still 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let claims = decode_token(token, &state.config.jwt_secret)?;
                Ok(MaybeAuthUser(Some(AuthUser {
                    user_id: claims.sub,
                    role: claims.role,
                })))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(DomainError::Forbidden("admin role required".to_string()).into());
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-at-least-16";

    #[test]
    fn test_issued_token_decodes() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, Role::Hairdresser, SECRET, 3600).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Hairdresser);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = issue_token(Uuid::new_v4(), Role::Client, SECRET, 3600).unwrap();
        let err = decode_token(&token, "another-secret-entirely").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let token = issue_token(Uuid::new_v4(), Role::Admin, SECRET, -3600).unwrap();
        match decode_token(&token, SECRET) {
            Err(AppError::Unauthorized(message)) => assert_eq!(message, "expired token"),
            other => panic!("expected expired token, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("salon".parse::<Role>().unwrap(), Role::Salon);
        assert!("guest".parse::<Role>().is_err());
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
    }
}
