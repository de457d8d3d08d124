//! Plugin registry routes.
//!
//! Reads are public. Creation needs a session; every other write also
//! needs the session user to be the plugin's author.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::{CurrentUser, require_session};
use crate::plugin::{
    AddDependency, CreatePlugin, Dependency, Plugin, PluginDetails, PluginError, UpdatePlugin,
};
use crate::state::AppState;

/// Count registry rejections by code before handing the error back.
fn rejected(state: &AppState, err: PluginError) -> PluginError {
    if err.status_code().is_client_error() {
        state.metrics().record_rejection(err.code());
    }
    err
}

/// GET /plugins
pub(crate) async fn list_plugins(
    State(state): State<AppState>,
) -> Result<Json<Vec<Plugin>>, PluginError> {
    Ok(Json(state.plugins().list_plugins().await?))
}

/// GET /plugins/names
pub(crate) async fn plugin_names(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, PluginError> {
    Ok(Json(state.plugins().plugin_names().await?))
}

/// GET /plugins/{id}
pub(crate) async fn get_plugin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PluginDetails>, PluginError> {
    Ok(Json(state.plugins().get_plugin(id).await?))
}

/// GET /plugins/{id}/reactions
pub(crate) async fn plugin_reactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, PluginError> {
    Ok(Json(state.plugins().reactions(id).await?))
}

/// POST /plugins
async fn create_plugin(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<CreatePlugin>,
) -> Result<(StatusCode, Json<PluginDetails>), PluginError> {
    let details = state
        .plugins()
        .create_plugin(body, user_id)
        .await
        .map_err(|e| rejected(&state, e))?;

    state.metrics().plugins_created.inc();
    state
        .metrics()
        .dependencies_added
        .inc_by(details.dependencies.len() as u64);

    Ok((StatusCode::CREATED, Json(details)))
}

/// PATCH /plugins/{id}
async fn update_plugin(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePlugin>,
) -> Result<Json<Plugin>, PluginError> {
    state.plugins().ensure_author(id, user_id).await?;
    let plugin = state
        .plugins()
        .update_plugin(id, body)
        .await
        .map_err(|e| rejected(&state, e))?;
    Ok(Json(plugin))
}

/// DELETE /plugins/{id}
///
/// Release files are removed after the row; a failure there leaves trash
/// for `clear-trash` rather than failing the request.
async fn delete_plugin(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PluginError> {
    state.plugins().ensure_author(id, user_id).await?;
    state.plugins().delete_plugin(id).await?;

    if let Err(e) = state.storage().delete_plugin(id).await {
        tracing::warn!(plugin_id = %id, error = %e, "failed to remove plugin files");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /plugins/{id}/dependencies
async fn add_dependency(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddDependency>,
) -> Result<(StatusCode, Json<Dependency>), PluginError> {
    state.plugins().ensure_author(id, user_id).await?;
    let edge = state
        .plugins()
        .add_dependency(id, body.dependency_id, body.version, body.optional)
        .await
        .map_err(|e| rejected(&state, e))?;

    state.metrics().dependencies_added.inc();
    Ok((StatusCode::CREATED, Json(edge)))
}

/// DELETE /plugins/{id}/dependencies/{dep_id}
async fn remove_dependency(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((id, dependency_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, PluginError> {
    state.plugins().ensure_author(id, user_id).await?;
    state
        .plugins()
        .remove_dependency(id, dependency_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the plugin router.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/plugins", get(list_plugins))
        .route("/plugins/names", get(plugin_names))
        .route("/plugins/{id}", get(get_plugin))
        .route("/plugins/{id}/reactions", get(plugin_reactions));

    let authenticated = Router::new()
        .route("/plugins", post(create_plugin))
        .route("/plugins/{id}", delete(delete_plugin).patch(update_plugin))
        .route("/plugins/{id}/dependencies", post(add_dependency))
        .route(
            "/plugins/{id}/dependencies/{dep_id}",
            delete(remove_dependency),
        )
        .route_layer(middleware::from_fn(require_session));

    public.merge(authenticated)
}
