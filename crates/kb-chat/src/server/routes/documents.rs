//! Admin document endpoints: upload, scrape, list, delete, progress

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{too_large_message, FileKind, UploadedFile};
use crate::processing::{IngestStage, StageEvent};
use crate::server::extract::AdminUser;
use crate::server::state::AppState;
use crate::types::{Document, DocumentStatus, DocumentView};

/// Body of `POST /api/admin/scrape`
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
}

fn multipart_error(err: MultipartError, max_file_size: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::validation(too_large_message(max_file_size))
    } else {
        Error::validation(format!("Invalid upload: {}", err.body_text()))
    }
}

/// POST /api/admin/upload - multipart field `file`
pub async fn upload(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    let max_file_size = state.config().upload.max_file_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);

        // Reject the type before buffering the body
        FileKind::detect(&filename, content_type.as_deref())?;

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_file_size))?;

        tracing::info!("Upload from {}: {} ({} bytes)", admin.username, filename, data.len());

        let file = UploadedFile::new(filename, content_type, data);
        let document = state.documents().ingest_file(admin.id, file).await?;
        return Ok((StatusCode::CREATED, Json(document)));
    }

    Err(Error::validation("No file uploaded"))
}

/// POST /api/admin/scrape
pub async fn scrape(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<(StatusCode, Json<Document>)> {
    let document = state.documents().ingest_url(admin.id, &request.url).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/admin/documents
pub async fn list_documents(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentView>>> {
    Ok(Json(state.documents().list_documents()?))
}

/// DELETE /api/admin/documents/:id
pub async fn delete_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.documents().delete_document(id).await?;

    Ok(Json(serde_json::json!({
        "message": "Document deleted",
        "id": id,
    })))
}

/// GET /api/admin/documents/:id/progress
///
/// Documents no longer in flight (finished, or pending across a restart)
/// are answered from the stored status.
pub async fn document_progress(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StageEvent>> {
    if let Some(event) = state.progress().latest(id) {
        return Ok(Json(event));
    }

    let document = state
        .documents()
        .get_document(id)?
        .ok_or_else(|| Error::NotFound("Document not found".to_string()))?;

    let stage = match document.status {
        DocumentStatus::Pending => IngestStage::Received,
        DocumentStatus::Processed => IngestStage::Processed,
        DocumentStatus::Failed => IngestStage::Failed,
    };

    Ok(Json(StageEvent {
        document_id: id,
        stage,
        at: document.created_at,
    }))
}

/// GET /api/admin/documents/events - stage changes as Server-Sent Events
pub async fn document_events(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.progress().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => serde_json::to_string(&event)
            .ok()
            .map(|json| Ok(Event::default().event("stage").data(json))),
        Err(e) => {
            tracing::debug!("Progress subscriber lagged: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
