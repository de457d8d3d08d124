//! Versioned read-only API.
//!
//! `GET /api/v1/{*path}` resolves the path into an [`ApiCall`] and
//! dispatches it to the same handlers as the REST routes.

use std::fmt;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use uuid::Uuid;

use super::{plugin, release, stats};
use crate::state::AppState;

/// A resolved API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCall {
    AllPlugins,
    PluginNames,
    GetPlugin(Uuid),
    PluginReleases(Uuid),
    LatestRelease(Uuid),
    PluginReactions(Uuid),
    GetRelease(Uuid),
    Stats,
}

/// Why a path did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCallError {
    RouteNotFound(String),
    InvalidId(String),
}

impl fmt::Display for ApiCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiCallError::RouteNotFound(path) => write!(f, "no API route for '{path}'"),
            ApiCallError::InvalidId(id) => write!(f, "'{id}' is not a valid id"),
        }
    }
}

impl std::error::Error for ApiCallError {}

impl IntoResponse for ApiCallError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ApiCallError::RouteNotFound(_) => (StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND"),
            ApiCallError::InvalidId(_) => (StatusCode::BAD_REQUEST, "INVALID_ID"),
        };
        (
            status,
            Json(json!({ "error": self.to_string(), "code": code })),
        )
            .into_response()
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiCallError> {
    Uuid::parse_str(raw).map_err(|_| ApiCallError::InvalidId(raw.to_string()))
}

impl ApiCall {
    /// Resolve a path such as `plugins/get/<id>`. Empty segments are ignored.
    pub fn parse(path: &str) -> Result<Self, ApiCallError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let call = match segments.as_slice() {
            ["plugins", "all"] => ApiCall::AllPlugins,
            ["plugins", "names"] => ApiCall::PluginNames,
            ["plugins", "get", id] => ApiCall::GetPlugin(parse_id(id)?),
            ["plugins", "releases", "get", id] => ApiCall::PluginReleases(parse_id(id)?),
            ["plugins", "releases", "latest", id] => ApiCall::LatestRelease(parse_id(id)?),
            ["plugins", "reactions", id] => ApiCall::PluginReactions(parse_id(id)?),
            ["releases", "get", id] => ApiCall::GetRelease(parse_id(id)?),
            ["stats"] => ApiCall::Stats,
            _ => return Err(ApiCallError::RouteNotFound(path.to_string())),
        };
        Ok(call)
    }

    /// Run the call against the application state.
    pub async fn dispatch(self, state: AppState) -> Response {
        let state = State(state);
        match self {
            ApiCall::AllPlugins => plugin::list_plugins(state).await.into_response(),
            ApiCall::PluginNames => plugin::plugin_names(state).await.into_response(),
            ApiCall::GetPlugin(id) => plugin::get_plugin(state, Path(id)).await.into_response(),
            ApiCall::PluginReleases(id) => {
                release::list_releases(state, Path(id)).await.into_response()
            }
            ApiCall::LatestRelease(id) => {
                release::latest_release(state, Path(id)).await.into_response()
            }
            ApiCall::PluginReactions(id) => {
                plugin::plugin_reactions(state, Path(id)).await.into_response()
            }
            ApiCall::GetRelease(id) => release::get_release(state, Path(id)).await.into_response(),
            ApiCall::Stats => stats::stats(state).await.into_response(),
        }
    }
}

/// GET /api/v1/{*path}
async fn dispatch(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match ApiCall::parse(&path) {
        Ok(call) => call.dispatch(state).await,
        Err(e) => e.into_response(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/{*path}", get(dispatch))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_call() {
        let id = Uuid::now_v7();
        assert_eq!(ApiCall::parse("plugins/all").unwrap(), ApiCall::AllPlugins);
        assert_eq!(ApiCall::parse("plugins/names").unwrap(), ApiCall::PluginNames);
        assert_eq!(
            ApiCall::parse(&format!("plugins/get/{id}")).unwrap(),
            ApiCall::GetPlugin(id)
        );
        assert_eq!(
            ApiCall::parse(&format!("plugins/releases/get/{id}")).unwrap(),
            ApiCall::PluginReleases(id)
        );
        assert_eq!(
            ApiCall::parse(&format!("plugins/releases/latest/{id}")).unwrap(),
            ApiCall::LatestRelease(id)
        );
        assert_eq!(
            ApiCall::parse(&format!("plugins/reactions/{id}")).unwrap(),
            ApiCall::PluginReactions(id)
        );
        assert_eq!(
            ApiCall::parse(&format!("releases/get/{id}")).unwrap(),
            ApiCall::GetRelease(id)
        );
        assert_eq!(ApiCall::parse("stats/").unwrap(), ApiCall::Stats);
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(
            ApiCall::parse("plugins/everything").unwrap_err(),
            ApiCallError::RouteNotFound("plugins/everything".to_string())
        );
        assert!(matches!(
            ApiCall::parse("plugins/get").unwrap_err(),
            ApiCallError::RouteNotFound(_)
        ));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert_eq!(
            ApiCall::parse("plugins/get/not-a-uuid").unwrap_err(),
            ApiCallError::InvalidId("not-a-uuid".to_string())
        );
    }
}
