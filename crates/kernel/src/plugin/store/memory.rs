//! In-memory plugin store.
//!
//! Used by tests and tooling. A transaction holds the state lock until it
//! commits or is dropped, and works on a staged copy so that dropping it
//! discards every write.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{PluginStore, PluginTransaction};
use crate::plugin::dependency::DependencyGraph;
use crate::plugin::error::StoreError;
use crate::plugin::types::{Dependency, NewDependency, NewPlugin, Plugin, PluginChanges};

#[derive(Debug, Clone, Default)]
struct State {
    plugins: HashMap<Uuid, Plugin>,
    /// Edges in insertion order.
    edges: Vec<Dependency>,
    /// Ids handed out by the next `insert_plugin` calls, before random ones.
    queued_ids: VecDeque<Uuid>,
}

impl State {
    fn edges_from(&self, id: Uuid) -> impl Iterator<Item = &Dependency> {
        self.edges
            .iter()
            .filter(move |e| e.dependent_plugin_id == id)
    }

    fn has_edge(&self, dependent: Uuid, dependency: Uuid) -> bool {
        self.edges_from(dependent)
            .any(|e| e.dependency_plugin_id == dependency)
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.plugins
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }
}

/// Plugin store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryPluginStore {
    state: Arc<Mutex<State>>,
}

impl MemoryPluginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next inserted plugin receive `id`.
    pub async fn queue_id(&self, id: Uuid) {
        self.state.lock().await.queued_ids.push_back(id);
    }

    /// Write an edge without any checks, as if it had been left behind by
    /// an earlier bug or a manual edit.
    pub async fn insert_raw_edge(&self, dependent: Uuid, dependency: Uuid) {
        self.state.lock().await.edges.push(Dependency {
            dependent_plugin_id: dependent,
            dependency_plugin_id: dependency,
            version: None,
            is_optional: false,
        });
    }

    /// Every stored edge as `(dependent, dependency)` pairs.
    pub async fn edges(&self) -> Vec<(Uuid, Uuid)> {
        self.state
            .lock()
            .await
            .edges
            .iter()
            .map(|e| (e.dependent_plugin_id, e.dependency_plugin_id))
            .collect()
    }
}

#[async_trait]
impl PluginStore for MemoryPluginStore {
    async fn find_plugin(&self, id: Uuid) -> Result<Option<Plugin>, StoreError> {
        Ok(self.state.lock().await.plugins.get(&id).cloned())
    }

    async fn find_plugins(&self, ids: &[Uuid]) -> Result<Vec<Plugin>, StoreError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.plugins.get(id).cloned())
            .collect())
    }

    async fn list_plugins(&self) -> Result<Vec<Plugin>, StoreError> {
        let state = self.state.lock().await;
        let mut plugins: Vec<Plugin> = state.plugins.values().cloned().collect();
        plugins.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(plugins)
    }

    async fn plugin_names(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state.plugins.values().map(|p| p.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn count_plugins(&self) -> Result<i64, StoreError> {
        Ok(self.state.lock().await.plugins.len() as i64)
    }

    async fn dependencies(&self, id: Uuid) -> Result<Vec<Dependency>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.edges_from(id).cloned().collect())
    }

    async fn forks_of(&self, id: Uuid) -> Result<Vec<Plugin>, StoreError> {
        let state = self.state.lock().await;
        let mut forks: Vec<Plugin> = state
            .plugins
            .values()
            .filter(|p| p.fork_origin_id == Some(id))
            .cloned()
            .collect();
        forks.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(forks)
    }

    async fn update_plugin(
        &self,
        id: Uuid,
        changes: &PluginChanges,
    ) -> Result<Option<Plugin>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(name) = &changes.name
            && state.name_taken(name, Some(id))
        {
            return Err(StoreError::DuplicateName);
        }

        let Some(plugin) = state.plugins.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            plugin.name.clone_from(name);
        }
        if let Some(description) = &changes.description {
            plugin.description.clone_from(description);
        }
        if let Some(tags) = &changes.tags {
            plugin.tags.clone_from(tags);
        }
        plugin.updated = Utc::now();
        Ok(Some(plugin.clone()))
    }

    async fn delete_plugin(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.plugins.remove(&id).is_none() {
            return Ok(false);
        }
        state
            .edges
            .retain(|e| e.dependent_plugin_id != id && e.dependency_plugin_id != id);
        for plugin in state.plugins.values_mut() {
            if plugin.fork_origin_id == Some(id) {
                plugin.fork_origin_id = None;
            }
        }
        Ok(true)
    }

    async fn remove_dependency(
        &self,
        dependent: Uuid,
        dependency: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.edges.len();
        state
            .edges
            .retain(|e| !(e.dependent_plugin_id == dependent && e.dependency_plugin_id == dependency));
        Ok(state.edges.len() != before)
    }

    async fn begin(&self) -> Result<Box<dyn PluginTransaction>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl DependencyGraph for MemoryTransaction {
    async fn dependencies_of(&mut self, id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .staged
            .edges_from(id)
            .map(|e| e.dependency_plugin_id)
            .collect())
    }
}

#[async_trait]
impl PluginTransaction for MemoryTransaction {
    async fn has_dependency(
        &mut self,
        dependent: Uuid,
        dependency: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.staged.has_edge(dependent, dependency))
    }

    async fn insert_plugin(&mut self, plugin: &NewPlugin) -> Result<Plugin, StoreError> {
        if self.staged.name_taken(&plugin.name, None) {
            return Err(StoreError::DuplicateName);
        }

        let id = self
            .staged
            .queued_ids
            .pop_front()
            .unwrap_or_else(Uuid::now_v7);
        let now = Utc::now();
        let stored = Plugin {
            id,
            name: plugin.name.clone(),
            description: plugin.description.clone(),
            license: plugin.license,
            author_id: plugin.author_id,
            target_platforms: plugin.target_platforms.clone(),
            tags: plugin.tags.clone(),
            fork_origin_id: plugin.fork_origin_id,
            reactions: serde_json::json!({}),
            created: now,
            updated: now,
        };
        self.staged.plugins.insert(id, stored.clone());
        Ok(stored)
    }

    async fn insert_dependency(&mut self, edge: &NewDependency) -> Result<Dependency, StoreError> {
        if self
            .staged
            .has_edge(edge.dependent_plugin_id, edge.dependency_plugin_id)
        {
            return Err(StoreError::DuplicateDependency);
        }
        let dependency = Dependency {
            dependent_plugin_id: edge.dependent_plugin_id,
            dependency_plugin_id: edge.dependency_plugin_id,
            version: edge.version.clone(),
            is_optional: edge.is_optional,
        };
        self.staged.edges.push(dependency.clone());
        Ok(dependency)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
