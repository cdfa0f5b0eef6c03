//! HTTP API driven in-process through the router.
#![cfg(feature = "http-server")]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use capsuleos::config::SearchConfig;
use capsuleos::documents::DocumentStore;
use capsuleos::http::{AppState, router};
use capsuleos::search::SearchIndex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::RwLock;
use tower::ServiceExt;

fn app(temp: &TempDir) -> Router {
    let config = SearchConfig::default();
    let index = SearchIndex::build(temp.path(), &config).unwrap();
    let state = AppState::new(
        DocumentStore::new(temp.path()),
        Arc::new(RwLock::new(index)),
        config,
    );
    router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_capsule_lifecycle() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, created) = call(
        &app,
        "POST",
        "/api/capsules",
        Some(json!({ "title": "Test", "tags": ["demo"], "payload": { "text": "first" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["version"], 1);
    assert_eq!(created["base"], "Test");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        "POST",
        "/api/capsules",
        Some(json!({ "id": id, "title": "Test", "payload": { "text": "second" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);

    let (status, restored) =
        call(&app, "POST", "/api/restore/Test", Some(json!({ "version": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["version"], 3);
    assert_eq!(restored["payload"]["text"], "first");

    let (_, versions) = call(&app, "GET", "/api/versions/Test", None).await;
    assert_eq!(versions, json!({ "base": "Test", "versions": [1, 2, 3] }));

    let (_, history) = call(&app, "GET", &format!("/api/capsules/{id}/history"), None).await;
    assert_eq!(history["versions"].as_array().unwrap().len(), 3);

    let (_, list) = call(&app, "GET", "/api/capsules", None).await;
    let capsules = list["capsules"].as_array().unwrap();
    assert_eq!(capsules.len(), 1);
    assert_eq!(capsules[0]["version"], 3);

    // the index followed every write
    let (_, search) = call(&app, "GET", "/api/search?q=demo", None).await;
    let results = search["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["itemId"], "capsules/Test.v3.json");

    let (status, _) = call(&app, "DELETE", &format!("/api/capsules/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, search) = call(&app, "GET", "/api/search?q=demo&versions=all", None).await;
    assert!(search["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_archive_and_search_flags() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (_, created) = call(
        &app,
        "POST",
        "/api/capsules",
        Some(json!({ "title": "Shelf", "payload": { "text": "dusty box" } })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "POST", &format!("/api/capsules/{id}/archive"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archived"], true);

    let (_, search) = call(&app, "GET", "/api/search?q=dusty", None).await;
    assert!(search["results"].as_array().unwrap().is_empty());

    let (_, search) = call(&app, "GET", "/api/search?q=dusty&includeArchived=1", None).await;
    let results = search["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["archived"], true);
    assert_eq!(results[0]["module"], "archive");

    let (_, archived) = call(&app, "GET", "/api/capsules?archived=true", None).await;
    assert_eq!(archived["capsules"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "POST", &format!("/api/capsules/{id}/unarchive"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, search) = call(&app, "GET", "/api/search?q=dusty", None).await;
    assert_eq!(search["results"].as_array().unwrap().len(), 1);

    let (status, body) = call(&app, "GET", "/api/search?q=dusty&versions=newest", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("versions"));
}

#[tokio::test]
async fn test_plain_files() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, _) = call(
        &app,
        "POST",
        "/api/file/notes/today.md",
        Some(json!({ "content": "# Standup\nhello world" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, file) = call(&app, "GET", "/api/file/notes/today.md", None).await;
    assert_eq!(file["content"], "# Standup\nhello world");

    let (_, listing) = call(&app, "GET", "/api/files/notes", None).await;
    assert_eq!(listing["files"][0]["name"], "today.md");

    let (_, search) = call(&app, "GET", "/api/search?q=hello", None).await;
    assert_eq!(search["results"][0]["path"], "notes/today.md");

    let (status, _) = call(&app, "DELETE", "/api/file/notes/today.md", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, search) = call(&app, "GET", "/api/search?q=hello", None).await;
    assert!(search["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_errors() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);

    let (status, body) = call(&app, "GET", "/api/versions/Missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) =
        call(&app, "POST", "/api/restore/Missing", Some(json!({ "version": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "DELETE", "/api/capsules/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/api/file/notes/missing.md", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/api/file/notes/..%2F..%2Fetc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, search) = call(&app, "GET", "/api/search?q=", None).await;
    assert!(search["results"].as_array().unwrap().is_empty());
}
