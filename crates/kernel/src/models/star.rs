//! Plugin stars.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Default number of stargazers returned for a plugin.
pub const DEFAULT_STARGAZER_LIMIT: i64 = 10;

/// A plugin a user has starred, with its newest release if any.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StarredPlugin {
    pub plugin_id: Uuid,
    pub plugin_name: String,
    pub starred_at: DateTime<Utc>,
    pub latest_release_id: Option<Uuid>,
    pub latest_version: Option<String>,
}

/// A user who starred a plugin.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Stargazer {
    pub user_id: Uuid,
    pub username: String,
    pub starred_at: DateTime<Utc>,
}

pub struct Star;

impl Star {
    /// Returns `false` if the star already existed.
    pub async fn add(pool: &PgPool, user_id: Uuid, plugin_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO plugin_stars (user_id, plugin_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, plugin_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(plugin_id)
        .execute(pool)
        .await
        .context("failed to add star")?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if there was no star to remove.
    pub async fn remove(pool: &PgPool, user_id: Uuid, plugin_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plugin_stars WHERE user_id = $1 AND plugin_id = $2")
            .bind(user_id)
            .bind(plugin_id)
            .execute(pool)
            .await
            .context("failed to remove star")?;

        Ok(result.rows_affected() > 0)
    }

    /// Star if not starred, unstar otherwise. Returns the new state.
    pub async fn toggle(pool: &PgPool, user_id: Uuid, plugin_id: Uuid) -> Result<bool> {
        if Self::remove(pool, user_id, plugin_id).await? {
            return Ok(false);
        }
        Self::add(pool, user_id, plugin_id).await?;
        Ok(true)
    }

    pub async fn is_starred(pool: &PgPool, user_id: Uuid, plugin_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM plugin_stars WHERE user_id = $1 AND plugin_id = $2)",
        )
        .bind(user_id)
        .bind(plugin_id)
        .fetch_one(pool)
        .await
        .context("failed to check star")
    }

    pub async fn count_for_plugin(pool: &PgPool, plugin_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plugin_stars WHERE plugin_id = $1")
            .bind(plugin_id)
            .fetch_one(pool)
            .await
            .context("failed to count stars")
    }

    /// Plugins starred by a user, most recently starred first.
    pub async fn starred_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<StarredPlugin>> {
        let rows = sqlx::query_as::<_, StarredPlugin>(
            r#"
            SELECT p.id AS plugin_id,
                   p.name AS plugin_name,
                   s.created AS starred_at,
                   r.id AS latest_release_id,
                   r.version AS latest_version
            FROM plugin_stars s
            JOIN plugins p ON p.id = s.plugin_id
            LEFT JOIN LATERAL (
                SELECT id, version FROM plugin_releases
                WHERE plugin_id = p.id
                ORDER BY created DESC
                LIMIT 1
            ) r ON TRUE
            WHERE s.user_id = $1
            ORDER BY s.created DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("failed to list starred plugins")?;

        Ok(rows)
    }

    /// Most recent stargazers of a plugin.
    pub async fn stargazers(pool: &PgPool, plugin_id: Uuid, limit: i64) -> Result<Vec<Stargazer>> {
        let rows = sqlx::query_as::<_, Stargazer>(
            r#"
            SELECT u.id AS user_id, u.username, s.created AS starred_at
            FROM plugin_stars s
            JOIN users u ON u.id = s.user_id
            WHERE s.plugin_id = $1
            ORDER BY s.created DESC
            LIMIT $2
            "#,
        )
        .bind(plugin_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list stargazers")?;

        Ok(rows)
    }
}
