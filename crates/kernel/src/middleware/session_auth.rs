//! Session authentication middleware.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::SESSION_USER_ID;

/// The authenticated user, set by [`require_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Rejects requests without a logged-in session with a 401 JSON error.
///
/// On success the user id is available to handlers as [`CurrentUser`].
pub async fn require_session(
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match session.get::<Uuid>(SESSION_USER_ID).await {
        Ok(Some(user_id)) => {
            request.extensions_mut().insert(CurrentUser(user_id));
            next.run(request).await
        }
        Ok(None) => AppError::Unauthorized.into_response(),
        Err(e) => AppError::Internal(anyhow::Error::new(e).context("failed to read session"))
            .into_response(),
    }
}

/// Only valid behind [`require_session`]; elsewhere it rejects with 401.
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}
