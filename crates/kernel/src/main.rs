//! Plugstore server binary.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use plugstore_kernel::cli::{self, Cli, Command};
use plugstore_kernel::config::Config;
use plugstore_kernel::db;
use plugstore_kernel::file::LocalReleaseStorage;
use plugstore_kernel::logging::{self, LogSettings, LoggingGuard};
use plugstore_kernel::plugin::PgPluginStore;
use plugstore_kernel::routes::{self, HttpSettings};
use plugstore_kernel::session::PgSessionStore;
use plugstore_kernel::state::AppState;

/// How often expired sessions are purged.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;

    let guard = logging::init(&LogSettings {
        dir: config.log_dir.clone(),
        to_file: config.log_to_file && cli.command() == Command::Serve,
    })
    .context("failed to initialize logging")?;

    let result = run(cli.command(), &config, &guard).await;
    if let Err(e) = &result {
        error!(error = ?e, "exiting with error");
    }

    guard.shutdown();
    result
}

async fn run(command: Command, config: &Config, guard: &LoggingGuard) -> Result<()> {
    match command {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = db::create_pool(config).await?;
            cli::cmd_migrate(&pool).await
        }
        Command::ClearLogs => cli::cmd_clear_logs(&config.log_dir, guard.log_file()),
        Command::ClearTrash => {
            let pool = db::create_pool(config).await?;
            cli::cmd_clear_trash(
                &PgPluginStore::new(pool),
                &LocalReleaseStorage::new(&config.storage_dir),
            )
            .await
        }
    }
}

async fn serve(config: &Config) -> Result<()> {
    info!(port = config.port, "starting plugstore");

    let state = AppState::new(config)
        .await
        .context("failed to initialize application state")?;
    info!("database connected and migrated");

    let sessions = PgSessionStore::new(state.db().clone());
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.delete_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions purged"),
                Err(e) => error!(error = %e, "failed to purge expired sessions"),
            }
        }
    });

    let app = routes::app(state.clone(), &HttpSettings::from_config(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    cleanup.abort();
    state.db().close().await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
