//! User model and CRUD operations.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

pub const USERNAME_MIN_CHARS: usize = 5;
pub const USERNAME_MAX_CHARS: usize = 15;
pub const EMAIL_MIN_CHARS: usize = 5;
pub const EMAIL_MAX_CHARS: usize = 40;
pub const TITLE_MAX_CHARS: usize = 50;
pub const BIO_MAX_CHARS: usize = 150;
pub const DEFAULT_TITLE: &str = "New User";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub title: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub preferences: serde_json::Value,
    pub is_supporter: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Input for registering a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Input for a combined profile update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub title: Option<String>,
    pub profile_picture: Option<String>,
    pub preferences: Option<serde_json::Value>,
}

/// Trim, lower-case and check an email address.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let len = email.chars().count();
    if !(EMAIL_MIN_CHARS..=EMAIL_MAX_CHARS).contains(&len) || !EMAIL_RE.is_match(&email) {
        return Err(AppError::bad_request(
            "INVALID_EMAIL",
            format!("email must be a valid address of {EMAIL_MIN_CHARS}-{EMAIL_MAX_CHARS} characters"),
        ));
    }
    Ok(email)
}

pub fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(AppError::bad_request(
            "INVALID_USERNAME",
            format!("username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters"),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::bad_request(
            "INVALID_TITLE",
            format!("title must be 1-{TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(title.to_string())
}

/// A blank bio clears it.
pub fn validate_bio(bio: &str) -> Result<Option<String>, AppError> {
    let bio = bio.trim();
    if bio.chars().count() > BIO_MAX_CHARS {
        return Err(AppError::bad_request(
            "INVALID_BIO",
            format!("bio must be at most {BIO_MAX_CHARS} characters"),
        ));
    }
    Ok((!bio.is_empty()).then(|| bio.to_string()))
}

impl User {
    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Find a user by username.
    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by username")?;

        Ok(user)
    }

    pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(pool)
            .await
            .context("failed to check username")
    }

    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await
            .context("failed to check email")
    }

    /// Create a new user. Fields must already be validated.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let id = Uuid::now_v7();
        let pass = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, pass, title)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.username)
        .bind(&pass)
        .bind(DEFAULT_TITLE)
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(user)
    }

    pub async fn update_username(pool: &PgPool, id: Uuid, username: &str) -> Result<Option<Self>> {
        Self::set_column(pool, id, "username", username).await
    }

    pub async fn update_title(pool: &PgPool, id: Uuid, title: &str) -> Result<Option<Self>> {
        Self::set_column(pool, id, "title", title).await
    }

    pub async fn update_bio(pool: &PgPool, id: Uuid, bio: Option<&str>) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET bio = $1, updated = now() WHERE id = $2 RETURNING *",
        )
        .bind(bio)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update bio")?;

        Ok(user)
    }

    pub async fn update_preferences(
        pool: &PgPool,
        id: Uuid,
        preferences: &serde_json::Value,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET preferences = $1, updated = now() WHERE id = $2 RETURNING *",
        )
        .bind(preferences)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update preferences")?;

        Ok(user)
    }

    /// Update any subset of username, title, profile picture and preferences.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        input: &UpdateProfile,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE($1, username),
                title = COALESCE($2, title),
                profile_picture = COALESCE($3, profile_picture),
                preferences = COALESCE($4, preferences),
                updated = now()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(input.username.as_deref())
        .bind(input.title.as_deref())
        .bind(input.profile_picture.as_deref())
        .bind(input.preferences.as_ref())
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update profile")?;

        Ok(user)
    }

    /// Flip the supporter badge and return the new state.
    pub async fn toggle_supporter(pool: &PgPool, id: Uuid) -> Result<Option<bool>> {
        let flag = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE users SET is_supporter = NOT is_supporter, updated = now()
            WHERE id = $1
            RETURNING is_supporter
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to toggle supporter flag")?;

        Ok(flag)
    }

    /// Delete a user.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.pass.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    async fn set_column(pool: &PgPool, id: Uuid, column: &str, value: &str) -> Result<Option<Self>> {
        // `column` is always one of a fixed set of literals from this module.
        let query = format!("UPDATE users SET {column} = $1, updated = now() WHERE id = $2 RETURNING *");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .bind(id)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("failed to update {column}"))?;

        Ok(user)
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user_with_password(password: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            email: "someone@example.com".to_string(),
            username: "someone".to_string(),
            pass: hash_password(password).unwrap(),
            title: DEFAULT_TITLE.to_string(),
            bio: None,
            profile_picture: None,
            preferences: serde_json::json!({}),
            is_supporter: false,
            created: now,
            updated: now,
        }
    }

    #[test]
    fn password_hash_is_argon2() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn verify_password_accepts_only_the_right_one() {
        let user = user_with_password("correct horse");
        assert!(user.verify_password("correct horse"));
        assert!(!user.verify_password("wrong horse"));
    }

    #[test]
    fn empty_hash_never_verifies() {
        let mut user = user_with_password("x");
        user.pass = String::new();
        assert!(!user.verify_password(""));
    }

    #[test]
    fn serialized_user_hides_secrets() {
        let user = user_with_password("secret");
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("pass").is_none());
        assert!(value.get("email").is_none());
        assert_eq!(value["title"], DEFAULT_TITLE);
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(normalize_email(" Me@Example.COM ").unwrap(), "me@example.com");
        assert_eq!(normalize_email("not-an-email").unwrap_err().code(), "INVALID_EMAIL");
        assert!(normalize_email(&format!("{}@example.com", "a".repeat(40))).is_err());
    }

    #[test]
    fn username_bounds() {
        assert!(validate_username("abcd").is_err());
        assert!(validate_username("abcde").is_ok());
        assert!(validate_username(&"a".repeat(16)).is_err());
    }

    #[test]
    fn title_and_bio_limits() {
        assert!(validate_title("").is_err());
        assert!(validate_title(&"t".repeat(51)).is_err());
        assert_eq!(validate_bio("   ").unwrap(), None);
        assert!(validate_bio(&"b".repeat(151)).is_err());
    }
}
