//! HTTP surface: GET and POST /api/sync
//!
//! The handlers stay thin; file-backed state lives in [`FileStore`]. The
//! store performs only structural validation before overwriting its single
//! backing file - no revision counters, no merge.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use keyfold_core::model;

use crate::store::FileStore;

pub async fn serve(port: u16, store: FileStore) -> anyhow::Result<()> {
    info!("document backed by {}", store.path().display());

    let app = router(Arc::new(store));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("sync server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(store: Arc<FileStore>) -> Router {
    Router::new()
        .route("/api/sync", get(get_sync).post(post_sync))
        .with_state(store)
}

async fn get_sync(State(store): State<Arc<FileStore>>) -> impl IntoResponse {
    match store.read() {
        Ok(document) => (StatusCode::OK, Json(document)),
        Err(e) => {
            error!("failed to read document: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to read document"})),
            )
        }
    }
}

async fn post_sync(
    State(store): State<Arc<FileStore>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let root = match model::validate_root(&body) {
        Ok(root) => root,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})));
        }
    };

    match store.write(&root) {
        Ok(()) => (StatusCode::OK, Json(json!({"success": true}))),
        Err(e) => {
            error!("failed to write document: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to write document"})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_core::model::Root;

    fn temp_store() -> (Arc<FileStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("keys.json")));
        (store, dir)
    }

    #[tokio::test]
    async fn test_get_returns_canonical_document_first() {
        let (store, _dir) = temp_store();
        let response = get_sync(State(store)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_valid_body_overwrites() {
        let (store, _dir) = temp_store();

        let mut root = Root::canonical_default();
        root.profiles[0].name = "Pushed".to_string();
        let body = serde_json::to_value(&root).unwrap();

        let response = post_sync(State(store.clone()), Json(body)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = store.read().unwrap();
        assert_eq!(stored["profiles"][0]["name"], "Pushed");
    }

    #[tokio::test]
    async fn test_post_invalid_body_rejected_and_file_untouched() {
        let (store, _dir) = temp_store();

        let mut root = Root::canonical_default();
        root.profiles[0].name = "Kept".to_string();
        store.write(&root).unwrap();

        let body = json!({"folders": "not-a-root"});
        let response = post_sync(State(store.clone()), Json(body)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let stored = store.read().unwrap();
        assert_eq!(stored["profiles"][0]["name"], "Kept");
    }

    #[tokio::test]
    async fn test_post_empty_profiles_rejected() {
        let (store, _dir) = temp_store();
        let body = json!({"profiles": [], "currentProfileId": ""});
        let response = post_sync(State(store), Json(body)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
