//! Registration, login and current-user endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::{LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::server::extract::AuthUser;
use crate::server::state::AppState;
use crate::types::{AuthResponse, User};

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = state.accounts().register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    Ok(Json(state.accounts().login(request).await?))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
