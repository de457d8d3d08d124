//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. Only commands that touch the database need it.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Root directory for release files (default: ./storage).
    pub storage_dir: PathBuf,

    /// Directory for per-run log files (default: ./logs).
    pub log_dir: PathBuf,

    /// Whether to write a log file for this run (default: true).
    pub log_to_file: bool,

    /// Bearer key for administrative routes. Those routes answer 500 when unset.
    pub master_api_key: Option<String>,

    /// Base URL of a remote user service. The local users table is used when unset.
    pub user_service_url: Option<Url>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Session inactivity expiry in days (default: 7).
    pub session_ttl_days: i64,

    /// Maximum accepted release upload size in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = var("DATABASE_URL").filter(|u| !u.trim().is_empty());

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let storage_dir = var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./storage"));

        let log_dir = var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./logs"));

        let log_to_file = parse_bool(&var("LOG_TO_FILE").unwrap_or_default(), true);

        let master_api_key = var("MASTER_API_KEY").filter(|k| !k.trim().is_empty());

        let user_service_url = match var("USER_SERVICE_URL") {
            Some(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim()).context("USER_SERVICE_URL must be an absolute URL")?,
            ),
            _ => None,
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let cookie_same_site = var("COOKIE_SAME_SITE")
            .unwrap_or_else(|| "strict".to_string())
            .to_lowercase();

        let session_ttl_days = var("SESSION_TTL_DAYS")
            .unwrap_or_else(|| "7".to_string())
            .parse()
            .context("SESSION_TTL_DAYS must be a whole number of days")?;

        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|| (10 * 1024 * 1024).to_string())
            .parse()
            .context("MAX_UPLOAD_BYTES must be a valid byte count")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            storage_dir,
            log_dir,
            log_to_file,
            master_api_key,
            user_service_url,
            cors_allowed_origins,
            cookie_same_site,
            session_ttl_days,
            max_upload_bytes,
        })
    }

    /// The database URL, for commands that cannot run without one.
    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL environment variable is required")
    }
}

fn parse_bool(raw: &str, default: bool) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn loads_without_a_database_url() {
        let config = config_from(&[("LOG_DIR", "/tmp/plugstore-logs")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.log_dir, PathBuf::from("/tmp/plugstore-logs"));
        assert_eq!(config.port, 3000);
        let err = config.database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn blank_database_url_counts_as_unset() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url().is_err());

        let url = "postgres://localhost/plugstore";
        let config = config_from(&[("DATABASE_URL", url)]).unwrap();
        assert_eq!(config.database_url().unwrap(), url);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config_from(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE", false));
        assert!(parse_bool(" yes ", false));
        assert!(!parse_bool("off", true));
        assert!(!parse_bool("0", true));
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("", true));
        assert!(!parse_bool("maybe", false));
    }
}
