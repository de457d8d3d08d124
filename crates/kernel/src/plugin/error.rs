//! Plugin registry error types.
//!
//! Every failure carries a stable machine-readable code and, where useful,
//! the offending values so clients can fix the request without guessing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use super::types::{License, Platform, Tag};

/// Errors returned by plugin registry operations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{message}")]
    InvalidName { message: String },

    #[error("{message}")]
    InvalidDescription { message: String },

    #[error("author '{author_id}' does not exist")]
    InvalidAuthor { author_id: Uuid },

    #[error("invalid license '{license}'")]
    InvalidLicense { license: String },

    #[error("{message}")]
    InvalidPlatform {
        message: String,
        invalid_platforms: Vec<String>,
    },

    #[error("invalid tags: {}", invalid_tags.join(", "))]
    InvalidTags { invalid_tags: Vec<String> },

    #[error("fork origin '{fork_origin_id}' not found")]
    ForkNotFound { fork_origin_id: Uuid },

    #[error("dependencies not found: {}", join_ids(not_found_ids))]
    DependencyNotFound { not_found_ids: Vec<Uuid> },

    #[error("plugin '{plugin_id}' cannot depend on itself")]
    SelfDependency { plugin_id: Uuid },

    #[error("adding dependency '{dependency_id}' to plugin '{plugin_id}' would create a cycle")]
    CircularDependency { plugin_id: Uuid, dependency_id: Uuid },

    #[error("plugin '{plugin_id}' already depends on '{dependency_id}'")]
    DuplicateDependency { plugin_id: Uuid, dependency_id: Uuid },

    #[error("a plugin named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("plugin '{plugin_id}' not found")]
    PluginNotFound { plugin_id: Uuid },

    #[error("only the author of plugin '{plugin_id}' may change it")]
    Forbidden { plugin_id: Uuid },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

impl PluginError {
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    pub fn invalid_description(message: impl Into<String>) -> Self {
        Self::InvalidDescription {
            message: message.into(),
        }
    }

    pub fn invalid_platform(message: impl Into<String>, invalid: Vec<String>) -> Self {
        Self::InvalidPlatform {
            message: message.into(),
            invalid_platforms: invalid,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::InvalidDescription { .. } => "INVALID_DESCRIPTION",
            Self::InvalidAuthor { .. } => "INVALID_AUTHOR",
            Self::InvalidLicense { .. } => "INVALID_LICENSE",
            Self::InvalidPlatform { .. } => "INVALID_PLATFORM",
            Self::InvalidTags { .. } => "INVALID_TAGS",
            Self::ForkNotFound { .. } => "FORK_NOT_FOUND",
            Self::DependencyNotFound { .. } => "DEPENDENCY_NOT_FOUND",
            Self::SelfDependency { .. } => "SELF_DEPENDENCY",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::DuplicateDependency { .. } => "DUPLICATE_DEPENDENCY",
            Self::DuplicateName { .. } => "DUPLICATE_NAME",
            Self::PluginNotFound { .. } => "PLUGIN_NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. }
            | Self::InvalidDescription { .. }
            | Self::InvalidAuthor { .. }
            | Self::InvalidLicense { .. }
            | Self::InvalidPlatform { .. }
            | Self::InvalidTags { .. }
            | Self::SelfDependency { .. } => StatusCode::BAD_REQUEST,
            Self::ForkNotFound { .. }
            | Self::DependencyNotFound { .. }
            | Self::PluginNotFound { .. } => StatusCode::NOT_FOUND,
            Self::CircularDependency { .. }
            | Self::DuplicateDependency { .. }
            | Self::DuplicateName { .. } => StatusCode::CONFLICT,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extra fields merged into the JSON error body.
    pub fn details(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            Self::InvalidLicense { .. } => {
                map.insert("valid_licenses".into(), json!(License::names()));
            }
            Self::InvalidPlatform {
                invalid_platforms, ..
            } => {
                map.insert("invalid_platforms".into(), json!(invalid_platforms));
                map.insert("valid_platforms".into(), json!(Platform::names()));
            }
            Self::InvalidTags { invalid_tags } => {
                map.insert("invalid_tags".into(), json!(invalid_tags));
                map.insert("valid_tags".into(), json!(Tag::names()));
            }
            Self::ForkNotFound { fork_origin_id } => {
                map.insert("fork_origin_id".into(), json!(fork_origin_id));
            }
            Self::DependencyNotFound { not_found_ids } => {
                map.insert("not_found_ids".into(), json!(not_found_ids));
            }
            Self::PluginNotFound { plugin_id }
            | Self::SelfDependency { plugin_id }
            | Self::Forbidden { plugin_id } => {
                map.insert("plugin_id".into(), json!(plugin_id));
            }
            Self::CircularDependency {
                plugin_id,
                dependency_id,
            }
            | Self::DuplicateDependency {
                plugin_id,
                dependency_id,
            } => {
                map.insert("plugin_id".into(), json!(plugin_id));
                map.insert("dependency_id".into(), json!(dependency_id));
            }
            _ => {}
        }
        map
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::Internal(cause) = &self {
            tracing::error!(error = ?cause, "plugin registry operation failed");
        }

        let mut body = self.details();
        body.insert("error".into(), Value::String(self.to_string()));
        body.insert("code".into(), Value::String(self.code().to_string()));

        (status, Json(Value::Object(body))).into_response()
    }
}

/// Failures reported by a plugin store backend.
///
/// Unique-constraint violations are surfaced separately so the registry can
/// turn them into the matching domain error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("plugin name already taken")]
    DuplicateName,

    #[error("dependency edge already exists")]
    DuplicateDependency,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Constraint names from the initial migration.
pub(crate) const PLUGIN_NAME_CONSTRAINT: &str = "plugins_name_key";
pub(crate) const DEPENDENCY_EDGE_CONSTRAINT: &str = "plugin_dependencies_edge_key";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            match db.constraint() {
                Some(PLUGIN_NAME_CONSTRAINT) => return Self::DuplicateName,
                Some(DEPENDENCY_EDGE_CONSTRAINT) => return Self::DuplicateDependency,
                _ => {}
            }
        }
        Self::Backend(anyhow::Error::new(err).context("plugin store query failed"))
    }
}

impl From<StoreError> for PluginError {
    /// Fallback for call sites where a unique violation is not expected.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Backend(cause) => Self::Internal(cause),
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_public_contract() {
        let id = Uuid::now_v7();
        assert_eq!(PluginError::invalid_name("x").code(), "INVALID_NAME");
        assert_eq!(
            PluginError::SelfDependency { plugin_id: id }.code(),
            "SELF_DEPENDENCY"
        );
        assert_eq!(
            PluginError::CircularDependency {
                plugin_id: id,
                dependency_id: id
            }
            .code(),
            "CIRCULAR_DEPENDENCY"
        );
        assert_eq!(
            PluginError::Internal(anyhow::anyhow!("boom")).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn status_codes_follow_error_class() {
        let id = Uuid::now_v7();
        assert_eq!(
            PluginError::InvalidTags {
                invalid_tags: vec![]
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PluginError::DependencyNotFound {
                not_found_ids: vec![id]
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PluginError::DuplicateDependency {
                plugin_id: id,
                dependency_id: id
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_tags_lists_valid_options() {
        let err = PluginError::InvalidTags {
            invalid_tags: vec!["Games".to_string()],
        };
        assert!(err.to_string().contains("Games"));
        let details = err.details();
        assert_eq!(details["invalid_tags"], json!(["Games"]));
        assert!(
            details["valid_tags"]
                .as_array()
                .is_some_and(|tags| tags.contains(&json!("Library")))
        );
    }

    #[test]
    fn dependency_not_found_names_missing_ids() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let err = PluginError::DependencyNotFound {
            not_found_ids: vec![a, b],
        };
        assert!(err.to_string().contains(&a.to_string()));
        assert!(err.to_string().contains(&b.to_string()));
        assert_eq!(err.details()["not_found_ids"], json!([a, b]));
    }

    #[test]
    fn plugin_scoped_errors_name_the_plugin() {
        let id = Uuid::now_v7();
        for err in [
            PluginError::PluginNotFound { plugin_id: id },
            PluginError::SelfDependency { plugin_id: id },
            PluginError::Forbidden { plugin_id: id },
        ] {
            assert_eq!(err.details()["plugin_id"], json!(id), "{}", err.code());
        }
    }

    #[test]
    fn internal_message_hides_cause() {
        let err = PluginError::from(StoreError::Backend(anyhow::anyhow!("connection reset")));
        assert_eq!(err.to_string(), "internal server error");
    }
}
