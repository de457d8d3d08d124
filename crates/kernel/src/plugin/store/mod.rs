//! Plugin registry persistence.
//!
//! The registry talks to storage through [`PluginStore`]. Graph mutations go
//! through a [`PluginTransaction`] so that node and edge writes commit or
//! roll back together. Dropping a transaction without committing rolls it
//! back.

mod memory;
mod postgres;

pub use memory::MemoryPluginStore;
pub use postgres::PgPluginStore;

use async_trait::async_trait;
use uuid::Uuid;

use super::dependency::DependencyGraph;
use super::error::StoreError;
use super::types::{Dependency, NewDependency, NewPlugin, Plugin, PluginChanges};

#[async_trait]
pub trait PluginStore: Send + Sync {
    async fn find_plugin(&self, id: Uuid) -> Result<Option<Plugin>, StoreError>;

    /// Plugins matching any of `ids`. Unknown ids are skipped.
    async fn find_plugins(&self, ids: &[Uuid]) -> Result<Vec<Plugin>, StoreError>;

    /// All plugins, newest first.
    async fn list_plugins(&self) -> Result<Vec<Plugin>, StoreError>;

    /// All plugin names, alphabetical.
    async fn plugin_names(&self) -> Result<Vec<String>, StoreError>;

    async fn count_plugins(&self) -> Result<i64, StoreError>;

    /// Outgoing edges of `id`.
    async fn dependencies(&self, id: Uuid) -> Result<Vec<Dependency>, StoreError>;

    /// Plugins whose fork origin is `id`.
    async fn forks_of(&self, id: Uuid) -> Result<Vec<Plugin>, StoreError>;

    /// Apply scalar changes. Returns `None` if the plugin does not exist.
    async fn update_plugin(
        &self,
        id: Uuid,
        changes: &PluginChanges,
    ) -> Result<Option<Plugin>, StoreError>;

    /// Delete a plugin and every edge touching it. Returns whether it existed.
    async fn delete_plugin(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Delete one edge. Returns whether it existed.
    async fn remove_dependency(&self, dependent: Uuid, dependency: Uuid)
    -> Result<bool, StoreError>;

    /// Start a graph mutation. Graph mutations are serialised: a second
    /// `begin` waits until the first transaction commits or is dropped.
    async fn begin(&self) -> Result<Box<dyn PluginTransaction>, StoreError>;
}

#[async_trait]
pub trait PluginTransaction: DependencyGraph {
    async fn has_dependency(&mut self, dependent: Uuid, dependency: Uuid)
    -> Result<bool, StoreError>;

    /// Insert a plugin node. The store assigns its id and timestamps.
    async fn insert_plugin(&mut self, plugin: &NewPlugin) -> Result<Plugin, StoreError>;

    async fn insert_dependency(&mut self, edge: &NewDependency) -> Result<Dependency, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
