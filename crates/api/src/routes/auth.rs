//! Registration and login handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use cartwheel_core::UserRole;

use crate::error::{AppError, Result};
use crate::models::{AccessToken, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

const fn default_role() -> UserRole {
    UserRole::User
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Register a new user.
///
/// POST /api/register
///
/// Admin accounts cannot be self-registered; they are created with
/// `cartwheel admin create`.
///
/// # Errors
///
/// Returns 400 for an invalid username or weak password, 403 when an admin
/// role is requested, 409 if the username is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    if request.role.is_admin() {
        return Err(AppError::Forbidden(
            "admin accounts cannot be self-registered".to_string(),
        ));
    }

    let auth = AuthService::new(state.store(), state.ids(), state.config().token_ttl);
    let user = auth
        .register(&request.username, &request.password, request.role)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and receive a bearer token.
///
/// POST /api/login
///
/// # Errors
///
/// Returns 401 if the username or password is wrong.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AccessToken>> {
    let auth = AuthService::new(state.store(), state.ids(), state.config().token_ttl);
    let token = auth.login(&request.username, &request.password).await?;
    Ok(Json(token))
}
