//! Admin user management

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::server::extract::AdminUser;
use crate::server::state::AppState;
use crate::types::User;

/// GET /api/admin/users - regular users only
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.accounts().list_users()?))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let removed = state.accounts().delete_user(&admin, id).await?;

    Ok(Json(serde_json::json!({
        "message": "User deleted",
        "id": id,
        "deleted_chats": removed.chats,
        "deleted_documents": removed.documents,
    })))
}
