//! Plugin star routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, require_session};
use crate::models::star::DEFAULT_STARGAZER_LIMIT;
use crate::models::{Star, Stargazer};
use crate::plugin::PluginError;
use crate::state::AppState;

const MAX_STARGAZER_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct StarState {
    pub plugin_id: Uuid,
    pub starred: bool,
    pub stars: i64,
}

#[derive(Debug, Deserialize)]
pub struct StargazerQuery {
    pub limit: Option<i64>,
}

async fn ensure_plugin(state: &AppState, plugin_id: Uuid) -> AppResult<()> {
    if state.plugins().find_plugin(plugin_id).await?.is_none() {
        return Err(PluginError::PluginNotFound { plugin_id }.into());
    }
    Ok(())
}

async fn star_state(state: &AppState, user_id: Uuid, plugin_id: Uuid) -> AppResult<StarState> {
    Ok(StarState {
        plugin_id,
        starred: Star::is_starred(state.db(), user_id, plugin_id).await?,
        stars: Star::count_for_plugin(state.db(), plugin_id).await?,
    })
}

/// GET /plugins/{id}/stars
async fn star_count(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    ensure_plugin(&state, plugin_id).await?;
    let stars = Star::count_for_plugin(state.db(), plugin_id).await?;
    Ok(Json(serde_json::json!({ "plugin_id": plugin_id, "stars": stars })))
}

/// GET /plugins/{id}/stargazers?limit=N
async fn stargazers(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
    Query(query): Query<StargazerQuery>,
) -> AppResult<Json<Vec<Stargazer>>> {
    ensure_plugin(&state, plugin_id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_STARGAZER_LIMIT)
        .clamp(1, MAX_STARGAZER_LIMIT);
    Ok(Json(Star::stargazers(state.db(), plugin_id, limit).await?))
}

/// GET /plugins/{id}/star
async fn get_star(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<StarState>> {
    ensure_plugin(&state, plugin_id).await?;
    Ok(Json(star_state(&state, user_id, plugin_id).await?))
}

/// POST /plugins/{id}/star
async fn add_star(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<StarState>)> {
    ensure_plugin(&state, plugin_id).await?;
    if !Star::add(state.db(), user_id, plugin_id).await? {
        return Err(AppError::conflict("ALREADY_STARRED", "plugin already starred"));
    }
    Ok((
        StatusCode::CREATED,
        Json(star_state(&state, user_id, plugin_id).await?),
    ))
}

/// DELETE /plugins/{id}/star
async fn remove_star(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<StarState>> {
    if !Star::remove(state.db(), user_id, plugin_id).await? {
        return Err(AppError::NotFound("star not found"));
    }
    Ok(Json(star_state(&state, user_id, plugin_id).await?))
}

/// POST /plugins/{id}/star/toggle
async fn toggle_star(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(plugin_id): Path<Uuid>,
) -> AppResult<Json<StarState>> {
    ensure_plugin(&state, plugin_id).await?;
    Star::toggle(state.db(), user_id, plugin_id).await?;
    Ok(Json(star_state(&state, user_id, plugin_id).await?))
}

/// Create the star router.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/plugins/{id}/stars", get(star_count))
        .route("/plugins/{id}/stargazers", get(stargazers));

    let authenticated = Router::new()
        .route(
            "/plugins/{id}/star",
            get(get_star).post(add_star).delete(remove_star),
        )
        .route("/plugins/{id}/star/toggle", post(toggle_star))
        .route_layer(middleware::from_fn(require_session));

    public.merge(authenticated)
}
