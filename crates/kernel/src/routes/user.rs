//! User account routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, require_session};
use crate::models::user::{
    CreateUser, UpdateProfile, normalize_email, validate_bio, validate_title, validate_username,
};
use crate::models::{Star, StarredPlugin, User, unique_violation};
use crate::state::AppState;

pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct BioRequest {
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub preferences: Value,
}

#[derive(Debug, Serialize)]
pub struct SupporterResponse {
    pub id: Uuid,
    pub is_supporter: bool,
}

fn username_taken(username: &str) -> AppError {
    AppError::conflict("USERNAME_TAKEN", format!("username '{username}' is taken"))
}

/// Map a failed user write, turning unique violations into conflicts.
fn write_failed(err: anyhow::Error, username: Option<&str>) -> AppError {
    match unique_violation(&err).as_deref() {
        Some("users_username_key") => username_taken(username.unwrap_or_default()),
        Some("users_email_key") => AppError::conflict("EMAIL_TAKEN", "email is already registered"),
        _ => AppError::Internal(err),
    }
}

fn found(user: Option<User>) -> AppResult<Json<User>> {
    user.map(Json).ok_or(AppError::NotFound("user not found"))
}

/// POST /users
async fn register(
    State(state): State<AppState>,
    Json(body): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let email = normalize_email(&body.email)?;
    let username = validate_username(&body.username)?;
    if body.password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AppError::bad_request(
            "INVALID_PASSWORD",
            format!("password must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }

    if User::username_exists(state.db(), &username).await? {
        return Err(username_taken(&username));
    }
    if User::email_exists(state.db(), &email).await? {
        return Err(AppError::conflict("EMAIL_TAKEN", "email is already registered"));
    }

    let user = User::create(
        state.db(),
        CreateUser {
            email,
            username: username.clone(),
            password: body.password,
        },
    )
    .await
    .map_err(|e| write_failed(e, Some(&username)))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}
async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    found(User::find_by_id(state.db(), id).await?)
}

/// GET /users/by-username/{username}
async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<User>> {
    found(User::find_by_username(state.db(), &username).await?)
}

/// GET /users/exists/{username}
async fn username_exists(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Value>> {
    let exists = User::username_exists(state.db(), username.trim()).await?;
    Ok(Json(json!({ "exists": exists })))
}

/// GET /users/{id}/stars
async fn user_stars(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<StarredPlugin>>> {
    if User::find_by_id(state.db(), id).await?.is_none() {
        return Err(AppError::NotFound("user not found"));
    }
    Ok(Json(Star::starred_by_user(state.db(), id).await?))
}

/// PUT /users/me/username
async fn update_username(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<UsernameRequest>,
) -> AppResult<Json<User>> {
    let username = validate_username(&body.username)?;
    let user = User::update_username(state.db(), user_id, &username)
        .await
        .map_err(|e| write_failed(e, Some(&username)))?;
    found(user)
}

/// PUT /users/me/title
async fn update_title(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<TitleRequest>,
) -> AppResult<Json<User>> {
    let title = validate_title(&body.title)?;
    found(User::update_title(state.db(), user_id, &title).await?)
}

/// PUT /users/me/bio
async fn update_bio(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<BioRequest>,
) -> AppResult<Json<User>> {
    let bio = validate_bio(&body.bio)?;
    found(User::update_bio(state.db(), user_id, bio.as_deref()).await?)
}

/// PUT /users/me/profile
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    let input = UpdateProfile {
        username: body.username.as_deref().map(validate_username).transpose()?,
        title: body.title.as_deref().map(validate_title).transpose()?,
        profile_picture: body
            .profile_picture
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        preferences: body.preferences,
    };

    let user = User::update_profile(state.db(), user_id, &input)
        .await
        .map_err(|e| write_failed(e, input.username.as_deref()))?;
    found(user)
}

/// PUT /users/me/preferences
async fn update_preferences(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<PreferencesRequest>,
) -> AppResult<Json<User>> {
    if !body.preferences.is_object() {
        return Err(AppError::bad_request(
            "INVALID_PREFERENCES",
            "preferences must be a JSON object",
        ));
    }
    found(User::update_preferences(state.db(), user_id, &body.preferences).await?)
}

/// DELETE /users/me
async fn delete_me(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<StatusCode> {
    if !User::delete(state.db(), user_id).await? {
        return Err(AppError::NotFound("user not found"));
    }
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    info!(user_id = %user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /users/{id}/supporter
async fn toggle_supporter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SupporterResponse>> {
    let is_supporter = User::toggle_supporter(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("user not found"))?;

    info!(user_id = %id, is_supporter, "supporter flag toggled");
    Ok(Json(SupporterResponse { id, is_supporter }))
}

/// Create the user router.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/users", post(register))
        .route("/users/{id}", get(get_user))
        .route("/users/by-username/{username}", get(get_user_by_username))
        .route("/users/exists/{username}", get(username_exists))
        .route("/users/{id}/stars", get(user_stars));

    let authenticated = Router::new()
        .route("/users/me", delete(delete_me))
        .route("/users/me/username", put(update_username))
        .route("/users/me/title", put(update_title))
        .route("/users/me/bio", put(update_bio))
        .route("/users/me/profile", put(update_profile))
        .route("/users/me/preferences", put(update_preferences))
        .route_layer(middleware::from_fn(require_session));

    public.merge(authenticated)
}

/// User routes that require the master key. The caller applies the layer.
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/users/{id}/supporter", put(toggle_supporter))
}
