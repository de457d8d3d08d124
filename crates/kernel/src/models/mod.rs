//! Database models.

pub mod release;
pub mod star;
pub mod user;

pub use release::{NewRelease, Release};
pub use star::{Star, Stargazer, StarredPlugin};
pub use user::User;

/// Name of the unique constraint behind `err`, if it is a unique violation.
pub fn unique_violation(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<sqlx::Error>()? {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}
