//! Plugin registry operations.
//!
//! Every write runs its field checks first and touches the store only
//! after they pass. Graph writes go through one store transaction and
//! either commit completely or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::dependency::would_create_cycle;
use super::error::{PluginError, StoreError};
use super::store::PluginStore;
use super::types::{
    CreatePlugin, Dependency, DependencySummary, NewDependency, NewPlugin, Plugin, PluginChanges,
    PluginDetails, PluginSummary, UpdatePlugin,
};
use super::validation::{
    dedupe_dependencies, validate_description, validate_license, validate_name,
    validate_platforms, validate_tags,
};
use crate::services::user_directory::UserDirectory;

/// Plugin registry service.
pub struct PluginService {
    store: Arc<dyn PluginStore>,
    users: Arc<dyn UserDirectory>,
}

impl PluginService {
    pub fn new(store: Arc<dyn PluginStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { store, users }
    }

    /// Create a plugin together with its initial dependency edges.
    pub async fn create_plugin(
        &self,
        input: CreatePlugin,
        author_id: Uuid,
    ) -> Result<PluginDetails, PluginError> {
        let name = validate_name(&input.name)?;
        let description = validate_description(input.description.as_deref())?;
        let license = validate_license(&input.license)?;
        let target_platforms = validate_platforms(&input.target_platforms)?;
        let mut tags = validate_tags(&input.tags)?;

        if !self.users.user_exists(author_id).await? {
            return Err(PluginError::InvalidAuthor { author_id });
        }

        let fork_origin = match input.fork_origin_id {
            Some(fork_origin_id) => {
                let origin = self
                    .store
                    .find_plugin(fork_origin_id)
                    .await?
                    .ok_or(PluginError::ForkNotFound { fork_origin_id })?;
                // Tags are copied once at creation; later edits to the
                // origin do not propagate.
                if tags.is_empty() {
                    tags.clone_from(&origin.tags);
                }
                Some(origin)
            }
            None => None,
        };

        let candidates = dedupe_dependencies(input.dependencies);
        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.plugin_id).collect();
        let targets = self.resolve_all(&candidate_ids).await?;

        let mut tx = self.store.begin().await?;

        let plugin = tx
            .insert_plugin(&NewPlugin {
                name: name.clone(),
                description,
                license,
                author_id,
                target_platforms,
                tags,
                fork_origin_id: fork_origin.as_ref().map(|o| o.id),
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateName => PluginError::DuplicateName { name },
                other => other.into(),
            })?;

        let mut dependencies = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.plugin_id == plugin.id {
                return Err(PluginError::SelfDependency {
                    plugin_id: plugin.id,
                });
            }
            if would_create_cycle(&mut *tx, plugin.id, candidate.plugin_id).await? {
                warn!(
                    plugin_id = %plugin.id,
                    dependency_id = %candidate.plugin_id,
                    "rejecting plugin creation: dependency would create a cycle"
                );
                return Err(PluginError::CircularDependency {
                    plugin_id: plugin.id,
                    dependency_id: candidate.plugin_id,
                });
            }

            let edge = tx
                .insert_dependency(&NewDependency {
                    dependent_plugin_id: plugin.id,
                    dependency_plugin_id: candidate.plugin_id,
                    version: candidate.version,
                    is_optional: candidate.optional,
                })
                .await
                .map_err(|e| match e {
                    StoreError::DuplicateDependency => PluginError::DuplicateDependency {
                        plugin_id: plugin.id,
                        dependency_id: candidate.plugin_id,
                    },
                    other => other.into(),
                })?;

            if let Some(target) = targets.get(&edge.dependency_plugin_id) {
                dependencies.push(summarize_edge(edge, target.summary()));
            }
        }

        tx.commit().await?;

        info!(
            plugin_id = %plugin.id,
            name = %plugin.name,
            dependencies = dependencies.len(),
            fork_origin_id = ?plugin.fork_origin_id,
            "plugin created"
        );

        Ok(PluginDetails {
            fork_origin: fork_origin.as_ref().map(Plugin::summary),
            plugin,
            dependencies,
            forks: Vec::new(),
        })
    }

    /// Add one dependency edge to an existing plugin.
    pub async fn add_dependency(
        &self,
        plugin_id: Uuid,
        dependency_id: Uuid,
        version: Option<String>,
        optional: bool,
    ) -> Result<Dependency, PluginError> {
        if plugin_id == dependency_id {
            return Err(PluginError::SelfDependency { plugin_id });
        }

        if self.store.find_plugin(plugin_id).await?.is_none() {
            return Err(PluginError::PluginNotFound { plugin_id });
        }
        if self.store.find_plugin(dependency_id).await?.is_none() {
            return Err(PluginError::DependencyNotFound {
                not_found_ids: vec![dependency_id],
            });
        }

        let mut tx = self.store.begin().await?;

        if tx.has_dependency(plugin_id, dependency_id).await? {
            return Err(PluginError::DuplicateDependency {
                plugin_id,
                dependency_id,
            });
        }

        if would_create_cycle(&mut *tx, plugin_id, dependency_id).await? {
            warn!(
                plugin_id = %plugin_id,
                dependency_id = %dependency_id,
                "rejecting dependency: would create a cycle"
            );
            return Err(PluginError::CircularDependency {
                plugin_id,
                dependency_id,
            });
        }

        let edge = tx
            .insert_dependency(&NewDependency {
                dependent_plugin_id: plugin_id,
                dependency_plugin_id: dependency_id,
                version: version.filter(|v| !v.trim().is_empty()),
                is_optional: optional,
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateDependency => PluginError::DuplicateDependency {
                    plugin_id,
                    dependency_id,
                },
                other => other.into(),
            })?;

        tx.commit().await?;

        info!(plugin_id = %plugin_id, dependency_id = %dependency_id, "dependency added");
        Ok(edge)
    }

    /// Remove one dependency edge. Removal cannot create a cycle.
    pub async fn remove_dependency(
        &self,
        plugin_id: Uuid,
        dependency_id: Uuid,
    ) -> Result<(), PluginError> {
        if !self.store.remove_dependency(plugin_id, dependency_id).await? {
            return Err(PluginError::DependencyNotFound {
                not_found_ids: vec![dependency_id],
            });
        }
        info!(plugin_id = %plugin_id, dependency_id = %dependency_id, "dependency removed");
        Ok(())
    }

    /// Update name, description or tags. Never touches the graph.
    pub async fn update_plugin(
        &self,
        plugin_id: Uuid,
        input: UpdatePlugin,
    ) -> Result<Plugin, PluginError> {
        let changes = PluginChanges {
            name: input.name.as_deref().map(validate_name).transpose()?,
            description: match input.description {
                Some(description) => Some(validate_description(Some(&description))?),
                None => None,
            },
            tags: input.tags.as_deref().map(validate_tags).transpose()?,
        };

        if changes.is_empty() {
            return self
                .store
                .find_plugin(plugin_id)
                .await?
                .ok_or(PluginError::PluginNotFound { plugin_id });
        }

        let updated = self
            .store
            .update_plugin(plugin_id, &changes)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateName => PluginError::DuplicateName {
                    name: changes.name.clone().unwrap_or_default(),
                },
                other => other.into(),
            })?
            .ok_or(PluginError::PluginNotFound { plugin_id })?;

        info!(plugin_id = %plugin_id, "plugin updated");
        Ok(updated)
    }

    /// Delete a plugin. Its edges go with it.
    pub async fn delete_plugin(&self, plugin_id: Uuid) -> Result<(), PluginError> {
        if !self.store.delete_plugin(plugin_id).await? {
            return Err(PluginError::PluginNotFound { plugin_id });
        }
        info!(plugin_id = %plugin_id, "plugin deleted");
        Ok(())
    }

    /// Fails unless `user_id` authored the plugin.
    pub async fn ensure_author(&self, plugin_id: Uuid, user_id: Uuid) -> Result<Plugin, PluginError> {
        let plugin = self
            .store
            .find_plugin(plugin_id)
            .await?
            .ok_or(PluginError::PluginNotFound { plugin_id })?;
        if plugin.author_id != user_id {
            return Err(PluginError::Forbidden { plugin_id });
        }
        Ok(plugin)
    }

    pub async fn find_plugin(&self, plugin_id: Uuid) -> Result<Option<Plugin>, PluginError> {
        Ok(self.store.find_plugin(plugin_id).await?)
    }

    /// A plugin with its fork origin, dependencies and forks.
    pub async fn get_plugin(&self, plugin_id: Uuid) -> Result<PluginDetails, PluginError> {
        let plugin = self
            .store
            .find_plugin(plugin_id)
            .await?
            .ok_or(PluginError::PluginNotFound { plugin_id })?;

        let fork_origin = match plugin.fork_origin_id {
            Some(origin_id) => self
                .store
                .find_plugin(origin_id)
                .await?
                .map(|o| o.summary()),
            None => None,
        };

        let edges = self.store.dependencies(plugin_id).await?;
        let target_ids: Vec<Uuid> = edges.iter().map(|e| e.dependency_plugin_id).collect();
        let targets: HashMap<Uuid, Plugin> = self
            .store
            .find_plugins(&target_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let dependencies = edges
            .into_iter()
            .filter_map(|edge| {
                let summary = targets.get(&edge.dependency_plugin_id)?.summary();
                Some(summarize_edge(edge, summary))
            })
            .collect();

        let forks = self
            .store
            .forks_of(plugin_id)
            .await?
            .iter()
            .map(Plugin::summary)
            .collect();

        Ok(PluginDetails {
            plugin,
            fork_origin,
            dependencies,
            forks,
        })
    }

    /// All plugins, newest first.
    pub async fn list_plugins(&self) -> Result<Vec<Plugin>, PluginError> {
        Ok(self.store.list_plugins().await?)
    }

    /// All plugin names, alphabetical.
    pub async fn plugin_names(&self) -> Result<Vec<String>, PluginError> {
        Ok(self.store.plugin_names().await?)
    }

    pub async fn count_plugins(&self) -> Result<i64, PluginError> {
        Ok(self.store.count_plugins().await?)
    }

    pub async fn reactions(&self, plugin_id: Uuid) -> Result<Value, PluginError> {
        self.store
            .find_plugin(plugin_id)
            .await?
            .map(|p| p.reactions)
            .ok_or(PluginError::PluginNotFound { plugin_id })
    }

    /// Resolve every id, failing with the full list of missing ones.
    async fn resolve_all(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Plugin>, PluginError> {
        let found: HashMap<Uuid, Plugin> = self
            .store
            .find_plugins(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let not_found_ids: Vec<Uuid> = ids
            .iter()
            .filter(|id| !found.contains_key(id))
            .copied()
            .collect();
        if !not_found_ids.is_empty() {
            return Err(PluginError::DependencyNotFound { not_found_ids });
        }
        Ok(found)
    }
}

fn summarize_edge(edge: Dependency, plugin: PluginSummary) -> DependencySummary {
    DependencySummary {
        plugin,
        version: edge.version,
        is_optional: edge.is_optional,
    }
}
