//! Route handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::documents::{CapsuleInput, DocumentVersion};
use crate::search::{QueryOptions, VersionScope};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub include_archived: Option<String>,
    pub versions: Option<String>,
    pub limit: Option<usize>,
}

/// `1`, `true` and `yes` (any case) are true; anything else is false.
fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_scope(value: Option<&str>) -> ApiResult<VersionScope> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("latest") => Ok(VersionScope::Latest),
        Some("all") => Ok(VersionScope::All),
        Some(other) => Err(ApiError::BadRequest(format!(
            "versions must be 'latest' or 'all', got '{other}'"
        ))),
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let options = QueryOptions {
        include_archived: parse_flag(params.include_archived.as_deref()),
        versions: parse_scope(params.versions.as_deref())?,
        limit: state.search.effective_limit(params.limit),
    };
    let results = state.index.read().await.query(&params.q, &options);
    Ok(Json(json!({ "results": results })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub archived: Option<String>,
}

pub async fn list_capsules(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let archived = parse_flag(params.archived.as_deref());
    let mut capsules = state.store.lock().await.list_latest(archived)?;
    capsules.sort_by(|a, b| {
        a.capsule
            .title
            .to_lowercase()
            .cmp(&b.capsule.title.to_lowercase())
            .then_with(|| a.base.cmp(&b.base))
    });
    Ok(Json(json!({ "capsules": capsules })))
}

pub async fn save_capsule(
    State(state): State<AppState>,
    Json(input): Json<CapsuleInput>,
) -> ApiResult<(StatusCode, Json<DocumentVersion>)> {
    let store = state.store.lock().await;
    let outcome = store.create_or_update(input)?;
    state.index.write().await.apply(&outcome.changes);
    drop(store);

    let status = if outcome.document.version == 1 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.document)))
}

pub async fn delete_capsule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let changes = store.delete(&id)?;
    state.index.write().await.apply(&changes);
    Ok(Json(json!({ "deleted": id, "files": changes.len() })))
}

async fn set_archived(state: &AppState, id: String, archived: bool) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let changes = store.set_archived(&id, archived)?;
    state.index.write().await.apply(&changes);
    Ok(Json(json!({
        "id": id,
        "archived": archived,
        "moved": changes.len() / 2,
    })))
}

pub async fn archive_capsule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    set_archived(&state, id, true).await
}

pub async fn unarchive_capsule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    set_archived(&state, id, false).await
}

pub async fn capsule_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let versions = state.store.lock().await.read_all_versions(&id)?;
    Ok(Json(json!({ "id": id, "versions": versions })))
}

pub async fn list_versions(
    State(state): State<AppState>,
    Path(base): Path<String>,
) -> ApiResult<Json<Value>> {
    let versions = state.store.lock().await.versions(&base)?;
    Ok(Json(json!({ "base": base, "versions": versions })))
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub version: u32,
}

pub async fn restore_version(
    State(state): State<AppState>,
    Path(base): Path<String>,
    Json(request): Json<RestoreRequest>,
) -> ApiResult<Json<DocumentVersion>> {
    let store = state.store.lock().await;
    let outcome = store.restore(&base, request.version)?;
    state.index.write().await.apply(&outcome.changes);
    Ok(Json(outcome.document))
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(folder): Path<String>,
) -> ApiResult<Json<Value>> {
    let files = state.files.list(&folder)?;
    Ok(Json(json!({ "folder": folder, "files": files })))
}

pub async fn read_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Json<Value>> {
    let content = state.files.read(&path)?;
    Ok(Json(json!({ "path": path, "content": content })))
}

#[derive(Debug, Deserialize)]
pub struct WriteFileRequest {
    pub content: String,
}

pub async fn write_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(request): Json<WriteFileRequest>,
) -> ApiResult<Json<Value>> {
    // Plain writes share the store lock so all writes stay ordered.
    let _store = state.store.lock().await;
    let change = state.files.write(&path, &request.content)?;
    state.index.write().await.apply(std::slice::from_ref(&change));
    Ok(Json(json!({ "path": path, "saved": true })))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Json<Value>> {
    let _store = state.store.lock().await;
    let change = state.files.delete(&path)?;
    state.index.write().await.apply(std::slice::from_ref(&change));
    Ok(Json(json!({ "path": path, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(parse_scope(None).unwrap(), VersionScope::Latest);
        assert_eq!(parse_scope(Some("latest")).unwrap(), VersionScope::Latest);
        assert_eq!(parse_scope(Some("All")).unwrap(), VersionScope::All);
        assert!(parse_scope(Some("some")).is_err());
    }
}
