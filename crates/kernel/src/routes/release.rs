//! Plugin release routes.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::file::{ReleaseFileKey, sha256_hex};
use crate::middleware::{CurrentUser, require_session};
use crate::models::release::{validate_notes, validate_version};
use crate::models::{NewRelease, Release, unique_violation};
use crate::plugin::{PluginError, PluginSummary};
use crate::state::AppState;

/// Body of `POST /plugins/{id}/releases` for a file that is already stored.
#[derive(Debug, Deserialize)]
pub struct CreateReleaseRequest {
    pub version: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub file_ref: String,
    pub hash: String,
}

/// A release together with the plugin it belongs to.
#[derive(Debug, Serialize)]
pub struct ReleaseWithPlugin {
    #[serde(flatten)]
    pub release: Release,
    pub plugin: PluginSummary,
}

fn validate_hash(hash: &str) -> AppResult<String> {
    let hash = hash.trim().to_ascii_lowercase();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::bad_request(
            "INVALID_HASH",
            "hash must be a hex-encoded SHA-256 digest",
        ));
    }
    Ok(hash)
}

/// GET /plugins/{id}/releases
pub(crate) async fn list_releases(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<Vec<Release>>> {
    if state.plugins().find_plugin(plugin_id).await?.is_none() {
        return Err(PluginError::PluginNotFound { plugin_id }.into());
    }
    Ok(Json(Release::list_for_plugin(state.db(), plugin_id).await?))
}

/// GET /plugins/{id}/releases/latest
pub(crate) async fn latest_release(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<Release>> {
    Release::latest_for_plugin(state.db(), plugin_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("release not found"))
}

/// GET /releases/{id}
pub(crate) async fn get_release(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReleaseWithPlugin>> {
    let release = Release::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("release not found"))?;
    let plugin = state
        .plugins()
        .find_plugin(release.plugin_id)
        .await?
        .ok_or(AppError::NotFound("release not found"))?;

    Ok(Json(ReleaseWithPlugin {
        plugin: plugin.summary(),
        release,
    }))
}

fn release_exists() -> AppError {
    AppError::conflict("RELEASE_EXISTS", "a release already uses this file")
}

/// POST /plugins/{id}/releases
async fn create_release(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
    Json(body): Json<CreateReleaseRequest>,
) -> AppResult<(StatusCode, Json<Release>)> {
    let version = validate_version(&body.version)?;
    let notes = validate_notes(body.notes.as_deref())?;
    let hash = validate_hash(&body.hash)?;
    state.plugins().ensure_author(plugin_id, user_id).await?;

    let key = ReleaseFileKey::parse(&body.file_ref)
        .map_err(|e| AppError::bad_request("INVALID_FILE_REF", e.to_string()))?;
    if key.plugin_id != plugin_id {
        return Err(AppError::bad_request(
            "INVALID_FILE_REF",
            "file reference belongs to another plugin",
        ));
    }
    let file = state
        .storage()
        .open(&key)
        .await?
        .ok_or_else(|| AppError::bad_request("FILE_NOT_FOUND", "release file is not stored"))?;

    if Release::find_by_id(state.db(), key.release_id).await?.is_some() {
        return Err(release_exists());
    }

    let release = Release::create(
        state.db(),
        &NewRelease {
            id: key.release_id,
            plugin_id,
            version,
            notes,
            file_ref: key.file_ref(),
            hash,
            size: i64::try_from(file.size).unwrap_or(i64::MAX),
        },
    )
    .await
    .map_err(|e| match unique_violation(&e) {
        Some(_) => release_exists(),
        None => AppError::Internal(e),
    })?;

    info!(release_id = %release.id, plugin_id = %plugin_id, version = %release.version, "release created");
    Ok((StatusCode::CREATED, Json(release)))
}

/// POST /plugins/{id}/releases/upload
///
/// Multipart fields: `file`, `version` and optional `notes`.
async fn upload_release(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Release>)> {
    state.plugins().ensure_author(plugin_id, user_id).await?;

    let mut version = None;
    let mut notes = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request("INVALID_UPLOAD", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("plugin").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request("INVALID_UPLOAD", e.body_text()))?;
                file = Some((filename, data.to_vec()));
            }
            "version" | "notes" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request("INVALID_UPLOAD", e.body_text()))?;
                if name == "version" {
                    version = Some(text);
                } else {
                    notes = Some(text);
                }
            }
            _ => {}
        }
    }

    let version = validate_version(version.as_deref().unwrap_or_default())?;
    let notes = validate_notes(notes.as_deref())?;
    let Some((filename, data)) = file else {
        return Err(AppError::bad_request("MISSING_FILE", "no file provided"));
    };
    if data.is_empty() {
        return Err(AppError::bad_request("MISSING_FILE", "uploaded file is empty"));
    }
    if data.len() > state.max_upload_bytes() {
        return Err(AppError::bad_request(
            "FILE_TOO_LARGE",
            format!("file exceeds {} bytes", state.max_upload_bytes()),
        ));
    }

    let key = ReleaseFileKey::new(plugin_id, Uuid::now_v7(), &filename);
    let hash = sha256_hex(&data);
    state.storage().write(&key, &data).await?;

    let created = Release::create(
        state.db(),
        &NewRelease {
            id: key.release_id,
            plugin_id,
            version,
            notes,
            file_ref: key.file_ref(),
            hash,
            size: i64::try_from(data.len()).unwrap_or(i64::MAX),
        },
    )
    .await;

    let release = match created {
        Ok(release) => release,
        Err(e) => {
            // The row is missing, so the file would be unreachable.
            if let Err(cleanup) = state
                .storage()
                .delete_release(key.plugin_id, key.release_id)
                .await
            {
                warn!(file_ref = %key, error = %cleanup, "failed to remove orphaned release file");
            }
            return Err(e.into());
        }
    };

    state.metrics().record_upload(data.len() as u64);
    info!(
        release_id = %release.id,
        plugin_id = %plugin_id,
        size = release.size,
        "release uploaded"
    );
    Ok((StatusCode::CREATED, Json(release)))
}

/// DELETE /releases/{id}
async fn delete_release(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let release = Release::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("release not found"))?;
    state
        .plugins()
        .ensure_author(release.plugin_id, user_id)
        .await?;

    Release::delete(state.db(), id).await?;
    if let Err(e) = state
        .storage()
        .delete_release(release.plugin_id, release.id)
        .await
    {
        warn!(release_id = %id, error = %e, "failed to remove release files");
    }

    info!(release_id = %id, plugin_id = %release.plugin_id, "release deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Create the release router.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/plugins/{id}/releases", get(list_releases))
        .route("/plugins/{id}/releases/latest", get(latest_release))
        .route("/releases/{id}", get(get_release));

    let authenticated = Router::new()
        .route("/plugins/{id}/releases", post(create_release))
        .route("/plugins/{id}/releases/upload", post(upload_release))
        .route("/releases/{id}", delete(delete_release))
        .route_layer(middleware::from_fn(require_session));

    public.merge(authenticated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_must_be_sha256_hex() {
        let digest = sha256_hex(b"plugin");
        assert_eq!(validate_hash(&digest.to_uppercase()).unwrap(), digest);
        assert_eq!(validate_hash("abc").unwrap_err().code(), "INVALID_HASH");
        assert!(validate_hash(&"g".repeat(64)).is_err());
    }
}
