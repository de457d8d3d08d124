//! Plugin release records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

pub const VERSION_MIN_CHARS: usize = 3;
pub const VERSION_MAX_CHARS: usize = 9;
pub const NOTES_MAX_CHARS: usize = 100;

/// Release record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Release {
    pub id: Uuid,
    pub plugin_id: Uuid,
    pub version: String,
    pub notes: String,
    /// `<plugin_id>/<release_id>/<filename>` under the storage root.
    pub file_ref: String,
    /// Hex-encoded SHA-256 of the file contents.
    pub hash: String,
    pub size: i64,
    pub downloads: i64,
    pub created: DateTime<Utc>,
}

/// Input for creating a release. Fields must already be validated.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub id: Uuid,
    pub plugin_id: Uuid,
    pub version: String,
    pub notes: String,
    pub file_ref: String,
    pub hash: String,
    pub size: i64,
}

pub fn validate_version(version: &str) -> Result<String, AppError> {
    let version = version.trim();
    let len = version.chars().count();
    if !(VERSION_MIN_CHARS..=VERSION_MAX_CHARS).contains(&len) {
        return Err(AppError::bad_request(
            "INVALID_VERSION",
            format!("release version must be {VERSION_MIN_CHARS}-{VERSION_MAX_CHARS} characters"),
        ));
    }
    Ok(version.to_string())
}

pub fn validate_notes(notes: Option<&str>) -> Result<String, AppError> {
    let notes = notes.map(str::trim).unwrap_or_default();
    if notes.chars().count() > NOTES_MAX_CHARS {
        return Err(AppError::bad_request(
            "INVALID_NOTES",
            format!("release notes must be at most {NOTES_MAX_CHARS} characters"),
        ));
    }
    Ok(notes.to_string())
}

impl Release {
    pub async fn create(pool: &PgPool, input: &NewRelease) -> Result<Self> {
        let release = sqlx::query_as::<_, Release>(
            r#"
            INSERT INTO plugin_releases (id, plugin_id, version, notes, file_ref, hash, size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.plugin_id)
        .bind(&input.version)
        .bind(&input.notes)
        .bind(&input.file_ref)
        .bind(&input.hash)
        .bind(input.size)
        .fetch_one(pool)
        .await
        .context("failed to create release")?;

        Ok(release)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let release = sqlx::query_as::<_, Release>("SELECT * FROM plugin_releases WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch release")?;

        Ok(release)
    }

    /// All releases of a plugin, newest first.
    pub async fn list_for_plugin(pool: &PgPool, plugin_id: Uuid) -> Result<Vec<Self>> {
        let releases = sqlx::query_as::<_, Release>(
            "SELECT * FROM plugin_releases WHERE plugin_id = $1 ORDER BY created DESC",
        )
        .bind(plugin_id)
        .fetch_all(pool)
        .await
        .context("failed to list releases")?;

        Ok(releases)
    }

    pub async fn latest_for_plugin(pool: &PgPool, plugin_id: Uuid) -> Result<Option<Self>> {
        let release = sqlx::query_as::<_, Release>(
            "SELECT * FROM plugin_releases WHERE plugin_id = $1 ORDER BY created DESC LIMIT 1",
        )
        .bind(plugin_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch latest release")?;

        Ok(release)
    }

    /// Release matching a stored file, used when the file itself is downloaded.
    pub async fn find_by_file_ref(pool: &PgPool, file_ref: &str) -> Result<Option<Self>> {
        let release =
            sqlx::query_as::<_, Release>("SELECT * FROM plugin_releases WHERE file_ref = $1")
                .bind(file_ref)
                .fetch_optional(pool)
                .await
                .context("failed to fetch release by file")?;

        Ok(release)
    }

    pub async fn increment_downloads(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE plugin_releases SET downloads = downloads + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to count download")?;

        Ok(())
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plugin_releases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete release")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plugin_releases")
            .fetch_one(pool)
            .await
            .context("failed to count releases")?;

        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn version_length_bounds() {
        assert!(validate_version("1.").is_err());
        assert_eq!(validate_version(" 1.0 ").unwrap(), "1.0");
        assert!(validate_version("1.2.3-rc1").is_ok());
        assert_eq!(
            validate_version("1.2.3-rc10").unwrap_err().code(),
            "INVALID_VERSION"
        );
    }

    #[test]
    fn notes_default_to_empty() {
        assert_eq!(validate_notes(None).unwrap(), "");
        assert!(validate_notes(Some(&"n".repeat(100))).is_ok());
        assert_eq!(
            validate_notes(Some(&"n".repeat(101))).unwrap_err().code(),
            "INVALID_NOTES"
        );
    }
}
