#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Router tests that run without a database.
//!
//! The plugin registry and file storage are real; every route that needs
//! PostgreSQL is exercised in `postgres_test.rs` instead.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{FakeUsers, MASTER_KEY, TestApp, lazy_pool, response_json, response_text};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use plugstore_kernel::file::{LocalReleaseStorage, ReleaseFileKey, ReleaseStorage};
use plugstore_kernel::plugin::{CreatePlugin, DependencyRequest, MemoryPluginStore};
use plugstore_kernel::routes::{self, HttpSettings};
use plugstore_kernel::state::{AppParts, AppState};

async fn seed_plugin(app: &TestApp, name: &str, deps: &[Uuid]) -> Uuid {
    let author = Uuid::now_v7();
    app.users.as_ref().unwrap().add(author).await;
    let body = CreatePlugin {
        name: name.to_string(),
        license: "MIT".to_string(),
        target_platforms: vec!["Extera".to_string()],
        dependencies: deps.iter().copied().map(DependencyRequest::Id).collect(),
        ..Default::default()
    };
    app.state
        .plugins()
        .create_plugin(body, author)
        .await
        .unwrap()
        .plugin
        .id
}

fn with_bearer(method: &str, uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {key}"))
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Health and metrics
// =============================================================================

#[tokio::test]
async fn health_reports_unreachable_database() {
    let app = TestApp::in_memory();
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["database"], false);
    assert_eq!(body["service"], "plugstore-kernel");
}

#[tokio::test]
async fn metrics_are_exposed_as_prometheus_text() {
    let app = TestApp::in_memory();
    app.get("/plugins").await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        routes::metrics::METRICS_CONTENT_TYPE
    );
    let text = response_text(response).await;
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("path=\"/plugins\""));
}

// =============================================================================
// Plugins
// =============================================================================

#[tokio::test]
async fn list_and_get_plugins() {
    let app = TestApp::in_memory();
    let base = seed_plugin(&app, "BaseLib", &[]).await;
    let top = seed_plugin(&app, "TopPlugin", &[base]).await;

    let response = app.get("/plugins").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = app.get("/plugins/names").await;
    assert_eq!(response_json(response).await, json!(["BaseLib", "TopPlugin"]));

    let response = app.get(&format!("/plugins/{top}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["id"], top.to_string());
    assert_eq!(body["name"], "TopPlugin");
    assert_eq!(body["dependencies"][0]["plugin"]["id"], base.to_string());
    assert_eq!(body["license"], "MIT");
    assert_eq!(body["target_platforms"], json!(["Extera"]));
}

#[tokio::test]
async fn unknown_plugin_is_a_json_404() {
    let app = TestApp::in_memory();
    let id = Uuid::now_v7();
    let response = app.get(&format!("/plugins/{id}")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["code"], "PLUGIN_NOT_FOUND");
    assert_eq!(body["plugin_id"], id.to_string());
}

#[tokio::test]
async fn plugin_writes_require_a_session() {
    let app = TestApp::in_memory();
    let id = seed_plugin(&app, "Protected", &[]).await;

    let body = json!({ "name": "Sneaky", "license": "MIT", "target_platforms": ["Extera"] });
    let response = app.send_json("POST", "/plugins", &body, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response_json(response).await["code"], "UNAUTHORIZED");

    let body = json!({ "dependency_id": Uuid::now_v7() });
    let response = app
        .send_json("POST", &format!("/plugins/{id}/dependencies"), &body, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Request::delete(format!("/plugins/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send_json("POST", &format!("/plugins/{id}/star"), &json!({}), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Versioned API
// =============================================================================

#[tokio::test]
async fn api_dispatches_to_plugin_readers() {
    let app = TestApp::in_memory();
    let id = seed_plugin(&app, "ApiPlugin", &[]).await;

    let response = app.get("/api/v1/plugins/all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await[0]["id"], id.to_string());

    let response = app.get("/api/v1/plugins/names").await;
    assert_eq!(response_json(response).await, json!(["ApiPlugin"]));

    let response = app.get(&format!("/api/v1/plugins/get/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["name"], "ApiPlugin");

    let response = app.get(&format!("/api/v1/plugins/reactions/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({}));
}

#[tokio::test]
async fn api_rejects_unknown_paths_and_bad_ids() {
    let app = TestApp::in_memory();

    let response = app.get("/api/v1/plugins/everything").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "ROUTE_NOT_FOUND");

    let response = app.get("/api/v1/plugins/get/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["code"], "INVALID_ID");

    let id = Uuid::now_v7();
    let response = app.get(&format!("/api/v1/plugins/get/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "PLUGIN_NOT_FOUND");
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn files_are_listed_and_downloaded() {
    let app = TestApp::in_memory();
    let plugin_id = Uuid::now_v7();
    let release_id = Uuid::now_v7();
    let storage = LocalReleaseStorage::new(app.storage_path());
    let key = ReleaseFileKey::new(plugin_id, release_id, "plugin.zip");
    storage.write(&key, b"zip bytes").await.unwrap();

    let response = app.get(&format!("/files/{plugin_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await,
        json!([format!("{release_id}/plugin.zip")])
    );

    let response = app
        .get(&format!("/files/{plugin_id}/{release_id}/plugin.zip"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plugin.zip\""
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    assert_eq!(response_text(response).await, "zip bytes");

    let response = app
        .get(&format!("/files/{plugin_id}/{release_id}/missing.zip"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn file_deletion_requires_the_master_key() {
    let app = TestApp::in_memory();
    let plugin_id = Uuid::now_v7();
    let storage = LocalReleaseStorage::new(app.storage_path());
    let key = ReleaseFileKey::new(plugin_id, Uuid::now_v7(), "plugin.zip");
    storage.write(&key, b"bytes").await.unwrap();

    let uri = format!("/files/{plugin_id}");

    let response = app
        .request(Request::delete(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.request(with_bearer("DELETE", &uri, "wrong-key")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(storage.plugin_ids().await.unwrap().contains(&plugin_id));

    let response = app.request(with_bearer("DELETE", &uri, MASTER_KEY)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(storage.plugin_ids().await.unwrap().is_empty());

    let response = app.request(with_bearer("DELETE", &uri, MASTER_KEY)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_fail_closed_without_a_configured_key() {
    let storage_dir = tempfile::tempdir().unwrap();
    let state = AppState::from_parts(AppParts {
        db: lazy_pool(),
        plugin_store: Arc::new(MemoryPluginStore::new()),
        users: Arc::new(FakeUsers::default()),
        storage: Arc::new(LocalReleaseStorage::new(storage_dir.path())),
        master_api_key: None,
        max_upload_bytes: 1024,
    });
    let router = routes::app(state, &HttpSettings::default());

    let response = router
        .oneshot(with_bearer(
            "DELETE",
            &format!("/files/{}", Uuid::now_v7()),
            MASTER_KEY,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
