//! Release file routes.
//!
//! Listing and downloads are public. Deleting files directly bypasses the
//! release rows, so those routes sit behind the master key.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::file::{ReleaseFileKey, sanitize_filename};
use crate::models::Release;
use crate::state::AppState;

/// GET /files/{plugin_id}
async fn list_files(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.storage().list_plugin_files(plugin_id).await?))
}

/// GET /files/{plugin_id}/{release_id}/{filename}
async fn download_file(
    State(state): State<AppState>,
    Path((plugin_id, release_id, filename)): Path<(Uuid, Uuid, String)>,
) -> AppResult<Response> {
    if sanitize_filename(&filename) != filename {
        return Err(AppError::NotFound("file not found"));
    }
    let key = ReleaseFileKey {
        plugin_id,
        release_id,
        filename,
    };

    let file = state
        .storage()
        .open(&key)
        .await?
        .ok_or(AppError::NotFound("file not found"))?;

    match Release::find_by_file_ref(state.db(), &key.file_ref()).await {
        Ok(Some(release)) => {
            if let Err(e) = Release::increment_downloads(state.db(), release.id).await {
                warn!(release_id = %release.id, error = %e, "failed to count download");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(file_ref = %key, error = %e, "failed to look up release for download"),
    }
    state.metrics().release_downloads.inc();

    let disposition = format!("attachment; filename=\"{}\"", key.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, file.size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file.reader)),
    )
        .into_response())
}

/// DELETE /files/{plugin_id}
async fn delete_plugin_files(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.storage().delete_plugin(plugin_id).await? {
        return Err(AppError::NotFound("plugin files not found"));
    }
    info!(plugin_id = %plugin_id, "plugin files deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /files/{plugin_id}/{release_id}
async fn delete_release_files(
    State(state): State<AppState>,
    Path((plugin_id, release_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    if !state
        .storage()
        .delete_release(plugin_id, release_id)
        .await?
    {
        return Err(AppError::NotFound("release files not found"));
    }
    info!(plugin_id = %plugin_id, release_id = %release_id, "release files deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Create the public file router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/{plugin_id}", get(list_files))
        .route(
            "/files/{plugin_id}/{release_id}/{filename}",
            get(download_file),
        )
}

/// File routes that require the master key. The caller applies the layer.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/files/{plugin_id}", delete(delete_plugin_files))
        .route(
            "/files/{plugin_id}/{release_id}",
            delete(delete_release_files),
        )
}
