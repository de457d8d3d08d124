//! Command-line interface.
//!
//! `serve` is the default. The maintenance commands run with a database
//! pool only and exit when done.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::file::ReleaseStorage;
use crate::plugin::PluginStore;

/// Plugin registry server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Delete log files from previous runs.
    ClearLogs,
    /// Delete stored files whose plugin no longer exists.
    ClearTrash,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// Apply migrations.
pub async fn cmd_migrate(pool: &PgPool) -> Result<()> {
    crate::db::run_migrations(pool).await?;
    println!("Migrations applied.");
    Ok(())
}

/// Remove log files, keeping the one the current run writes to.
pub fn cmd_clear_logs(dir: &Path, keep: Option<&Path>) -> Result<()> {
    let removed = crate::logging::clear_logs(dir, keep)
        .with_context(|| format!("failed to clear logs in {}", dir.display()))?;
    println!("Removed {removed} log file(s) from {}.", dir.display());
    Ok(())
}

/// Remove storage directories of deleted plugins. Returns the removed ids.
pub async fn clear_trash(
    plugins: &dyn PluginStore,
    storage: &dyn ReleaseStorage,
) -> Result<Vec<Uuid>> {
    let stored = storage.plugin_ids().await?;
    let known: HashSet<Uuid> = plugins
        .find_plugins(&stored)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut removed = Vec::new();
    for plugin_id in stored.into_iter().filter(|id| !known.contains(id)) {
        if storage.delete_plugin(plugin_id).await? {
            info!(plugin_id = %plugin_id, "removed orphaned plugin files");
            removed.push(plugin_id);
        }
    }
    Ok(removed)
}

pub async fn cmd_clear_trash(
    plugins: &dyn PluginStore,
    storage: &dyn ReleaseStorage,
) -> Result<()> {
    let removed = clear_trash(plugins, storage).await?;
    println!("Removed files of {} deleted plugin(s).", removed.len());
    Ok(())
}
