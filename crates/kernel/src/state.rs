//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::file::{LocalReleaseStorage, ReleaseStorage};
use crate::metrics::Metrics;
use crate::plugin::{PgPluginStore, PluginService, PluginStore};
use crate::services::user_directory::{HttpUserDirectory, LocalUserDirectory, UserDirectory};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Plugin registry.
    plugins: PluginService,

    /// Release file storage.
    storage: Arc<dyn ReleaseStorage>,

    /// Prometheus metrics.
    metrics: Arc<Metrics>,

    /// Bearer key for administrative routes.
    master_api_key: Option<String>,

    /// Maximum accepted release upload size in bytes.
    max_upload_bytes: usize,
}

/// Explicit collaborators for [`AppState`]. Tests use this to swap in the
/// in-memory plugin store or a temporary storage directory.
pub struct AppParts {
    pub db: PgPool,
    pub plugin_store: Arc<dyn PluginStore>,
    pub users: Arc<dyn UserDirectory>,
    pub storage: Arc<dyn ReleaseStorage>,
    pub master_api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create application state with a live database connection.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let users: Arc<dyn UserDirectory> = match &config.user_service_url {
            Some(url) => {
                info!(url = %url, "using remote user directory");
                Arc::new(HttpUserDirectory::new(url.clone()))
            }
            None => Arc::new(LocalUserDirectory::new(db.clone())),
        };

        Ok(Self::from_parts(AppParts {
            plugin_store: Arc::new(PgPluginStore::new(db.clone())),
            users,
            storage: Arc::new(LocalReleaseStorage::new(&config.storage_dir)),
            master_api_key: config.master_api_key.clone(),
            max_upload_bytes: config.max_upload_bytes,
            db,
        }))
    }

    pub fn from_parts(parts: AppParts) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                plugins: PluginService::new(parts.plugin_store, parts.users),
                db: parts.db,
                storage: parts.storage,
                metrics: Arc::new(Metrics::new()),
                master_api_key: parts.master_api_key,
                max_upload_bytes: parts.max_upload_bytes,
            }),
        }
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the plugin registry.
    pub fn plugins(&self) -> &PluginService {
        &self.inner.plugins
    }

    /// Get the release file storage.
    pub fn storage(&self) -> &Arc<dyn ReleaseStorage> {
        &self.inner.storage
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn master_api_key(&self) -> Option<&str> {
        self.inner.master_api_key.as_deref()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }

    /// Check if PostgreSQL is reachable.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}
