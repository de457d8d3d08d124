//! Plugstore test utilities.
//!
//! Helpers for integration testing: request body builders with unique
//! names, and assertion helpers for JSON error payloads.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// A name that is unique across test runs against a shared database.
///
/// `prefix` is truncated so the result always has `len` characters.
pub fn unique_name(prefix: &str, len: usize) -> String {
    let prefix: String = prefix.chars().take(len.saturating_sub(4)).collect();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len - prefix.chars().count())
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}

/// Create a plugin creation body with valid defaults.
pub fn test_plugin(name: &str) -> TestPlugin {
    TestPlugin {
        name: name.to_string(),
        description: None,
        license: "MIT".to_string(),
        target_platforms: vec!["Extera".to_string()],
        tags: Vec::new(),
        fork_origin_id: None,
        dependencies: Vec::new(),
    }
}

/// A plugin creation body builder.
#[derive(Debug, Clone)]
pub struct TestPlugin {
    pub name: String,
    pub description: Option<String>,
    pub license: String,
    pub target_platforms: Vec<String>,
    pub tags: Vec<String>,
    pub fork_origin_id: Option<Uuid>,
    pub dependencies: Vec<JsonValue>,
}

impl TestPlugin {
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_license(mut self, license: &str) -> Self {
        self.license = license.to_string();
        self
    }

    pub fn with_platforms(mut self, platforms: &[&str]) -> Self {
        self.target_platforms = platforms.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Fork another plugin.
    pub fn forked_from(mut self, origin: Uuid) -> Self {
        self.fork_origin_id = Some(origin);
        self
    }

    /// Depend on `plugin_id` with no version constraint.
    pub fn depends_on(mut self, plugin_id: Uuid) -> Self {
        self.dependencies.push(json!(plugin_id));
        self
    }

    /// Depend on `plugin_id` with a version constraint.
    pub fn depends_on_version(mut self, plugin_id: Uuid, version: &str, optional: bool) -> Self {
        self.dependencies.push(json!({
            "plugin_id": plugin_id,
            "version": version,
            "optional": optional,
        }));
        self
    }

    /// JSON body for `POST /plugins`.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "name": self.name,
            "description": self.description,
            "license": self.license,
            "target_platforms": self.target_platforms,
            "tags": self.tags,
            "fork_origin_id": self.fork_origin_id,
            "dependencies": self.dependencies,
        })
    }
}

/// Create a registration body with a unique username and email.
pub fn test_user() -> TestUser {
    let username = unique_name("user", 12);
    TestUser {
        email: format!("{}@example.com", username.to_lowercase()),
        username,
        password: "correct horse battery".to_string(),
    }
}

/// A registration body builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl TestUser {
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// JSON body for `POST /users`.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "email": self.email,
            "username": self.username,
            "password": self.password,
        })
    }

    /// JSON body for `POST /session/new`.
    pub fn login_json(&self) -> JsonValue {
        json!({
            "username": self.username,
            "password": self.password,
        })
    }
}

/// Assertion helpers for JSON payloads.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that an error body carries `code`.
    pub fn error_code(body: &Value, code: &str) {
        assert_eq!(
            body.get("code").and_then(Value::as_str),
            Some(code),
            "Expected error code '{code}', got: {body}"
        );
    }

    /// Assert that a JSON array of objects contains one whose `id` is `id`.
    pub fn contains_id(list: &Value, id: &str) {
        let found = list
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item["id"] == id));
        assert!(found, "Expected list to contain id {id}, got: {list}");
    }
}
