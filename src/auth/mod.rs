//! Bearer token authentication.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate keys. The mock backend accepts
//! any credentials, so issuance is the only real work done here.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{messages, AppError};
use crate::models::{
    RefreshResponse, TokenResponse, User, ACCESS_TOKEN_TTL_SECS, DEFAULT_ROLE,
    REFRESH_TOKEN_TTL_SECS,
};

/// Claims carried by both token kinds. Refresh tokens carry no roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access and refresh tokens.
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenIssuer {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
        }
    }

    /// Issue an access/refresh pair for a user.
    pub fn issue(&self, user: User) -> Result<TokenResponse, AppError> {
        let access_token = self.sign_access(&user.id, &user.email, user.roles.clone())?;

        let now = Utc::now().timestamp();
        let refresh_claims = Claims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            roles: Vec::new(),
            iat: now,
            exp: now + REFRESH_TOKEN_TTL_SECS,
        };
        let refresh_token = encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign refresh token: {}", e)))?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_TTL_SECS,
            user,
        })
    }

    /// Exchange a valid refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError> {
        let claims = decode::<Claims>(refresh_token, &self.refresh_decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Rejected refresh token: {}", e);
                AppError::Forbidden(messages::INVALID_REFRESH_TOKEN.to_string())
            })?
            .claims;

        let access_token = self.sign_access(
            &claims.user_id,
            &claims.email,
            vec![DEFAULT_ROLE.to_string()],
        )?;

        Ok(RefreshResponse {
            access_token,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected access token: {}", e);
                AppError::Forbidden(messages::INVALID_TOKEN.to_string())
            })
    }

    fn sign_access(&self, user_id: &str, email: &str, roles: Vec<String>) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            roles,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))
    }
}

/// Bearer auth layer: 401 without a token, 403 with a bad one.
///
/// Verified claims are stored in the request extensions.
pub async fn bearer_auth_layer(
    issuer: Arc<TokenIssuer>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(' ').nth(1))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let Some(token) = token else {
        return AppError::Unauthorized(messages::ACCESS_TOKEN_REQUIRED.to_string()).into_response();
    };

    match issuer.verify_access(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
