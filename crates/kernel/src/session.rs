//! Session management backed by PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};
use tracing::debug;

/// Session key for the authenticated user id.
pub const SESSION_USER_ID: &str = "user_id";

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sessionId";

/// Default session expiry (7 days of inactivity).
pub const DEFAULT_SESSION_EXPIRY_DAYS: i64 = 7;

/// Parse a SameSite policy name, defaulting to strict.
pub fn parse_same_site(policy: &str) -> SameSite {
    match policy {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

/// Create the session layer over the `sessions` table.
pub fn create_session_layer(
    pool: PgPool,
    same_site: SameSite,
    ttl_days: i64,
) -> SessionManagerLayer<PgSessionStore> {
    SessionManagerLayer::new(PgSessionStore::new(pool))
        .with_name(SESSION_COOKIE)
        .with_secure(true)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(Duration::days(ttl_days)))
}

/// Session store over the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove every expired session. Returns how many were removed.
    pub async fn delete_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expiry_date <= $1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// The session data as stored in the `data` column. The id lives in its
/// own TEXT column since it does not fit a JSON number.
fn encode(record: &Record) -> session_store::Result<serde_json::Value> {
    serde_json::to_value(&record.data).map_err(|e| session_store::Error::Encode(e.to_string()))
}

fn decode(id: Id, data: serde_json::Value, expiry: i64) -> session_store::Result<Record> {
    Ok(Record {
        id,
        data: serde_json::from_value(data)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?,
        expiry_date: OffsetDateTime::from_unix_timestamp(expiry)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?,
    })
}

fn backend(err: sqlx::Error) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // Retry on the (unlikely) id collision instead of overwriting
        // somebody else's session.
        loop {
            let result = sqlx::query(
                r#"
                INSERT INTO sessions (id, data, expiry_date)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(record.id.to_string())
            .bind(encode(record)?)
            .bind(record.expiry_date.unix_timestamp())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
            debug!("session id collision, regenerating");
            record.id = Id::default();
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expiry_date)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data, expiry_date = EXCLUDED.expiry_date
            "#,
        )
        .bind(record.id.to_string())
        .bind(encode(record)?)
        .bind(record.expiry_date.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let row = sqlx::query_as::<_, (serde_json::Value, i64)>(
            "SELECT data, expiry_date FROM sessions WHERE id = $1 AND expiry_date > $2",
        )
        .bind(session_id.to_string())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|(data, expiry)| decode(*session_id, data, expiry))
            .transpose()
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn records_survive_the_data_column() {
        let mut record = Record {
            id: Id::default(),
            data: Default::default(),
            expiry_date: OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap(),
        };
        record.data.insert(
            SESSION_USER_ID.to_string(),
            serde_json::json!("0190c3a2-7b1e-7c44-8d0e-2f1a9b3c4d5e"),
        );

        let stored = encode(&record).unwrap();
        assert!(stored.get("id").is_none());

        let loaded = decode(record.id, stored, record.expiry_date.unix_timestamp()).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.data, record.data);
        assert_eq!(loaded.expiry_date, record.expiry_date);
    }

    #[test]
    fn same_site_defaults_to_strict() {
        assert_eq!(parse_same_site("lax"), SameSite::Lax);
        assert_eq!(parse_same_site("none"), SameSite::None);
        assert_eq!(parse_same_site("bogus"), SameSite::Strict);
    }
}
