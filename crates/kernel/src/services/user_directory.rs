//! Author lookups for the plugin registry.
//!
//! The registry only needs to know whether a user id exists. That answer
//! comes either from the local `users` table or from a separate user
//! service over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use sqlx::PgPool;
use tracing::debug;
use url::Url;
use uuid::Uuid;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, id: Uuid) -> Result<bool>;
}

/// Looks users up in the local `users` table.
pub struct LocalUserDirectory {
    pool: PgPool,
}

impl LocalUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for LocalUserDirectory {
    async fn user_exists(&self, id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("failed to check user existence")
    }
}

/// Asks a remote user service: `GET {base}/users/{id}`.
///
/// 404 means the user does not exist. Positive answers are cached for a
/// minute; negative answers are not, so a freshly registered author is seen
/// immediately.
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
    known: Cache<Uuid, ()>,
}

impl HttpUserDirectory {
    pub fn new(base_url: Url) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            known: Cache::builder()
                .time_to_live(Duration::from_secs(60))
                .max_capacity(10_000)
                .build(),
        }
    }

    fn user_url(&self, id: Uuid) -> Result<Url> {
        let id = id.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("user service URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["users", id.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn user_exists(&self, id: Uuid) -> Result<bool> {
        if self.known.get(&id).await.is_some() {
            return Ok(true);
        }

        let url = self.user_url(id)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach user service at {url}"))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(user_id = %id, "user service reports unknown user");
                Ok(false)
            }
            status if status.is_success() => {
                self.known.insert(id, ()).await;
                Ok(true)
            }
            status => anyhow::bail!("user service returned {status} for user {id}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn user_url_appends_segments() {
        let dir = HttpUserDirectory::new(Url::parse("http://users.internal/api/").unwrap());
        let id = Uuid::now_v7();
        assert_eq!(
            dir.user_url(id).unwrap().as_str(),
            format!("http://users.internal/api/users/{id}")
        );
    }

    #[test]
    fn user_url_without_trailing_slash() {
        let dir = HttpUserDirectory::new(Url::parse("http://users.internal").unwrap());
        let id = Uuid::now_v7();
        assert_eq!(
            dir.user_url(id).unwrap().as_str(),
            format!("http://users.internal/users/{id}")
        );
    }

    #[tokio::test]
    async fn cached_users_skip_the_network() {
        // Port 9 (discard) is never contacted because the id is cached.
        let dir = HttpUserDirectory::new(Url::parse("http://127.0.0.1:9").unwrap());
        let id = Uuid::now_v7();
        dir.known.insert(id, ()).await;
        assert!(dir.user_exists(id).await.unwrap());
    }
}
