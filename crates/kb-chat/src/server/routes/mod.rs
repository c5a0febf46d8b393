//! API routes for the chat server

pub mod auth;
pub mod chat;
pub mod documents;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::server::rate_limit::chat_rate_limit;
use crate::server::state::AppState;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build all API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.config().upload.max_file_size + MULTIPART_OVERHEAD;

    let chat = Router::new()
        .route("/chat/ask", post(chat::ask))
        .route("/chat/history", get(chat::history))
        .route_layer(middleware::from_fn_with_state(state.clone(), chat_rate_limit));

    Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Documents - larger body limit for file uploads
        .route(
            "/admin/upload",
            post(documents::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/admin/scrape", post(documents::scrape))
        .route("/admin/documents", get(documents::list_documents))
        .route("/admin/documents/events", get(documents::document_events))
        .route("/admin/documents/:id", delete(documents::delete_document))
        .route("/admin/documents/:id/progress", get(documents::document_progress))
        // Users
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/:id", delete(users::delete_user))
        // Chat
        .merge(chat)
}
