//! Login and logout.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::session::SESSION_USER_ID;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(err).context("session store failure"))
}

/// POST /session/new
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<User>> {
    let user = User::find_by_username(state.db(), body.username.trim()).await?;

    // Same answer for unknown users and wrong passwords.
    let Some(user) = user.filter(|u| u.verify_password(&body.password)) else {
        warn!(username = %body.username, "failed login attempt");
        return Err(AppError::bad_request(
            "INVALID_CREDENTIALS",
            "invalid username or password",
        ));
    };

    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(session_error)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(user))
}

/// POST /session/expire
async fn logout(session: Session) -> AppResult<StatusCode> {
    let user_id: Option<Uuid> = session.get(SESSION_USER_ID).await.map_err(session_error)?;
    let Some(user_id) = user_id else {
        return Err(AppError::NotFound("session not found"));
    };

    session.flush().await.map_err(session_error)?;

    info!(user_id = %user_id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Create the session router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session/new", post(login))
        .route("/session/expire", post(logout))
}
