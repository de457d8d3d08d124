//! Registry statistics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::models::Release;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub plugins: i64,
    pub releases: i64,
}

/// GET /stats
pub(crate) async fn stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    let (plugins, releases) = tokio::join!(
        state.plugins().count_plugins(),
        Release::count(state.db())
    );
    Ok(Json(Stats {
        plugins: plugins?,
        releases: releases?,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}
