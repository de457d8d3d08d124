//! PostgreSQL-backed plugin store.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{PluginStore, PluginTransaction};
use crate::plugin::dependency::DependencyGraph;
use crate::plugin::error::StoreError;
use crate::plugin::types::{Dependency, NewDependency, NewPlugin, Plugin, PluginChanges};

/// Advisory lock key shared by every graph mutation.
///
/// Taken transaction-scoped at `begin`, so two concurrent edge insertions
/// cannot both pass the cycle check against the same snapshot.
const GRAPH_LOCK_KEY: i64 = 0x0070_6c75_6767_7261;

const PLUGIN_COLUMNS: &str = "id, name, description, license, author_id, target_platforms, \
                              tags, fork_origin_id, reactions, created, updated";

#[derive(sqlx::FromRow)]
struct PluginRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    license: String,
    author_id: Uuid,
    target_platforms: Vec<String>,
    tags: Vec<String>,
    fork_origin_id: Option<Uuid>,
    reactions: serde_json::Value,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<PluginRow> for Plugin {
    type Error = StoreError;

    fn try_from(row: PluginRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, value: String| {
            StoreError::Backend(anyhow!(
                "plugin {} has unrecognised {field} '{value}'",
                row.id
            ))
        };

        let license = row
            .license
            .parse()
            .map_err(|v| corrupt("license", v))?;
        let target_platforms = row
            .target_platforms
            .iter()
            .map(|p| p.parse().map_err(|v| corrupt("platform", v)))
            .collect::<Result<Vec<_>, _>>()?;
        let tags = row
            .tags
            .iter()
            .map(|t| t.parse().map_err(|v| corrupt("tag", v)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Plugin {
            id: row.id,
            name: row.name,
            description: row.description,
            license,
            author_id: row.author_id,
            target_platforms,
            tags,
            fork_origin_id: row.fork_origin_id,
            reactions: row.reactions,
            created: row.created,
            updated: row.updated,
        })
    }
}

fn into_plugins(rows: Vec<PluginRow>) -> Result<Vec<Plugin>, StoreError> {
    rows.into_iter().map(Plugin::try_from).collect()
}

fn strings<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Plugin store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgPluginStore {
    pool: PgPool,
}

impl PgPluginStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PluginStore for PgPluginStore {
    async fn find_plugin(&self, id: Uuid) -> Result<Option<Plugin>, StoreError> {
        let row = sqlx::query_as::<_, PluginRow>(&format!(
            "SELECT {PLUGIN_COLUMNS} FROM plugins WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Plugin::try_from).transpose()
    }

    async fn find_plugins(&self, ids: &[Uuid]) -> Result<Vec<Plugin>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, PluginRow>(&format!(
            "SELECT {PLUGIN_COLUMNS} FROM plugins WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        into_plugins(rows)
    }

    async fn list_plugins(&self) -> Result<Vec<Plugin>, StoreError> {
        let rows = sqlx::query_as::<_, PluginRow>(&format!(
            "SELECT {PLUGIN_COLUMNS} FROM plugins ORDER BY created DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_plugins(rows)
    }

    async fn plugin_names(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM plugins ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn count_plugins(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plugins")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn dependencies(&self, id: Uuid) -> Result<Vec<Dependency>, StoreError> {
        let edges = sqlx::query_as::<_, Dependency>(
            r#"
            SELECT dependent_plugin_id, dependency_plugin_id, version, is_optional
            FROM plugin_dependencies
            WHERE dependent_plugin_id = $1
            ORDER BY created ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(edges)
    }

    async fn forks_of(&self, id: Uuid) -> Result<Vec<Plugin>, StoreError> {
        let rows = sqlx::query_as::<_, PluginRow>(&format!(
            "SELECT {PLUGIN_COLUMNS} FROM plugins WHERE fork_origin_id = $1 ORDER BY created DESC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        into_plugins(rows)
    }

    async fn update_plugin(
        &self,
        id: Uuid,
        changes: &PluginChanges,
    ) -> Result<Option<Plugin>, StoreError> {
        let row = sqlx::query_as::<_, PluginRow>(&format!(
            r#"
            UPDATE plugins SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                tags = COALESCE($5, tags),
                updated = now()
            WHERE id = $1
            RETURNING {PLUGIN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.tags.as_deref().map(strings))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Plugin::try_from).transpose()
    }

    async fn delete_plugin(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM plugins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_dependency(
        &self,
        dependent: Uuid,
        dependency: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM plugin_dependencies WHERE dependent_plugin_id = $1 AND dependency_plugin_id = $2",
        )
        .bind(dependent)
        .bind(dependency)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin(&self) -> Result<Box<dyn PluginTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(GRAPH_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .context("failed to acquire dependency graph lock")?;

        Ok(Box::new(PgPluginTransaction { tx }))
    }
}

struct PgPluginTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DependencyGraph for PgPluginTransaction {
    async fn dependencies_of(&mut self, id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT dependency_plugin_id FROM plugin_dependencies WHERE dependent_plugin_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl PluginTransaction for PgPluginTransaction {
    async fn has_dependency(
        &mut self,
        dependent: Uuid,
        dependency: Uuid,
    ) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM plugin_dependencies
                WHERE dependent_plugin_id = $1 AND dependency_plugin_id = $2
            )
            "#,
        )
        .bind(dependent)
        .bind(dependency)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_plugin(&mut self, plugin: &NewPlugin) -> Result<Plugin, StoreError> {
        let row = sqlx::query_as::<_, PluginRow>(&format!(
            r#"
            INSERT INTO plugins
                (id, name, description, license, author_id, target_platforms, tags, fork_origin_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PLUGIN_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&plugin.name)
        .bind(plugin.description.as_deref())
        .bind(plugin.license.as_str())
        .bind(plugin.author_id)
        .bind(strings(&plugin.target_platforms))
        .bind(strings(&plugin.tags))
        .bind(plugin.fork_origin_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Plugin::try_from(row)
    }

    async fn insert_dependency(&mut self, edge: &NewDependency) -> Result<Dependency, StoreError> {
        let dependency = sqlx::query_as::<_, Dependency>(
            r#"
            INSERT INTO plugin_dependencies
                (id, dependent_plugin_id, dependency_plugin_id, version, is_optional)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING dependent_plugin_id, dependency_plugin_id, version, is_optional
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(edge.dependent_plugin_id)
        .bind(edge.dependency_plugin_id)
        .bind(edge.version.as_deref())
        .bind(edge.is_optional)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(dependency)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .context("failed to commit transaction")?;
        Ok(())
    }
}
