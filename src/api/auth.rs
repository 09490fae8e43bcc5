//! Mock authentication endpoints.
//!
//! Any credentials are accepted; only presence of the required fields is checked.

use axum::{extract::State, Json};

use super::{ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{
    LoginRequest, MessageResponse, RefreshRequest, RefreshResponse, RegisterRequest,
    TokenResponse, User, DEFAULT_ROLE,
};
use crate::AppState;

/// POST /auth/register - Register and issue tokens.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (Some(email), Some(_), Some(name)) = (
        non_empty(request.email),
        non_empty(request.password),
        non_empty(request.name),
    ) else {
        return Err(AppError::BadRequest(
            "Email, password and name are required".to_string(),
        ));
    };

    let user = new_user(name, email);
    tracing::info!("Registered user {}", user.id);
    Ok(Json(state.tokens.issue(user)?))
}

/// POST /auth/login - Log in and issue tokens.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (Some(email), Some(_)) = (non_empty(request.email), non_empty(request.password)) else {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    };

    let name = email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("User")
        .to_string();

    Ok(Json(state.tokens.issue(new_user(name, email))?))
}

/// POST /auth/refresh - Exchange a refresh token for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let Some(refresh_token) = non_empty(request.refresh_token) else {
        return Err(AppError::BadRequest("Refresh token is required".to_string()));
    };

    Ok(Json(state.tokens.refresh(&refresh_token)?))
}

/// POST /auth/logout - Nothing is revoked; tokens simply expire.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })
}

fn new_user(name: String, email: String) -> User {
    User {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        email,
        roles: vec![DEFAULT_ROLE.to_string()],
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
