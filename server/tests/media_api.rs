use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use terteryan_server::catalog::CatalogHandle;
use terteryan_server::derived::{spawn_worker, WorkerContext};
use terteryan_server::handlers::{
    delete_media_handler, get_media_handler, post_media_handler, put_media_handler,
};
use terteryan_server::state::AppState;
use terteryan_server::upload::FileStore;

fn temp_base(label: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("tmp")
        .join(format!(
            "{}_{}",
            label,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
}

fn build_state(base: &PathBuf) -> Arc<AppState> {
    let public_dir = base.join("public");
    let _ = std::fs::create_dir_all(&public_dir);
    let catalog = CatalogHandle::spawn(base.join("data").join("mediaData.json"));
    let jobs = spawn_worker(WorkerContext {
        catalog: catalog.clone(),
        public_dir: public_dir.clone(),
        ffmpeg_enabled: false,
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
    });
    Arc::new(AppState {
        catalog,
        jobs,
        store: FileStore::new(public_dir),
        http: reqwest::Client::new(),
        ffmpeg_enabled: false,
    })
}

fn query(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
    Query(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

async fn get_collection(state: &Arc<AppState>, kind: &str, locale: &str) -> Value {
    let Json(body) = get_media_handler(
        State(state.clone()),
        query(&[("type", kind), ("locale", locale)]),
    )
    .await
    .expect("GET failed");
    assert_eq!(body["success"], true);
    body["data"].clone()
}

#[tokio::test]
async fn post_then_get_round_trip() {
    let base = temp_base("roundtrip");
    let state = build_state(&base);

    let Json(posted) = post_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "music",
            "locale": "ru",
            "item": {
                "title": "Прелюдия №13",
                "composer": "М. Тертерян",
                "duration": "2:10",
                "src": "/audio/p13.mp3"
            }
        })),
    )
    .await
    .expect("POST failed");

    assert_eq!(posted["success"], true);
    let id = posted["data"]["id"].as_str().expect("id should be a string");
    assert!(!id.is_empty());

    let data = get_collection(&state, "music", "ru").await;
    let tracks = data["tracks"].as_array().expect("tracks array");
    let stored = tracks
        .iter()
        .find(|t| t["id"] == id)
        .expect("posted track should be in the collection");
    assert_eq!(stored["title"], "Прелюдия №13");
    assert_eq!(stored["composer"], "М. Тертерян");
    assert_eq!(stored["duration"], "2:10");
    assert_eq!(stored["src"], "/audio/p13.mp3");

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn put_is_idempotent() {
    let base = temp_base("put_idem");
    let state = build_state(&base);

    let Json(posted) = post_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "photos",
            "locale": "ru",
            "item": {"title": "Портрет", "src": "/photos/original/p.jpg", "description": "x", "year": "1990"}
        })),
    )
    .await
    .unwrap();
    let id = posted["data"]["id"].as_str().unwrap().to_string();

    let replacement = json!({
        "type": "photos",
        "locale": "ru",
        "item": {"id": id, "title": "Портрет (обновлено)", "src": "/photos/original/p.jpg", "description": "y", "year": 1990}
    });
    let Json(first) = put_media_handler(State(state.clone()), Json(replacement.clone()))
        .await
        .unwrap();
    let Json(second) = put_media_handler(State(state.clone()), Json(replacement))
        .await
        .unwrap();
    assert_eq!(first, second);

    let data = get_collection(&state, "photos", "ru").await;
    let items = data["items"].as_array().unwrap();
    let matching: Vec<_> = items.iter().filter(|i| i["id"] == id.as_str()).collect();
    assert_eq!(matching.len(), 1, "exactly one record with the id");
    assert_eq!(matching[0]["title"], "Портрет (обновлено)");
    assert_eq!(matching[0]["year"], 1990);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn put_unknown_id_returns_404() {
    let base = temp_base("put_404");
    let state = build_state(&base);

    let err = put_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "video",
            "locale": "ru",
            "item": {
                "id": "does-not-exist",
                "title": "t", "description": "d", "duration": "1:00",
                "thumbnail": "/placeholder.jpg", "videoUrl": "https://example.com/x"
            }
        })),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Item not found");
    assert_eq!(err.into_response().status(), 404);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn put_without_id_is_rejected() {
    let base = temp_base("put_noid");
    let state = build_state(&base);

    let err = put_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "music",
            "locale": "ru",
            "item": {"title": "t", "composer": "c", "src": "/audio/x.mp3"}
        })),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required parameters: type, locale, item with id"
    );
    assert_eq!(err.into_response().status(), 400);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn delete_is_final() {
    let base = temp_base("delete");
    let state = build_state(&base);

    let Json(posted) = post_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "publications",
            "locale": "ru",
            "item": {
                "title": "Статья", "description": "d", "type": "Статья",
                "author": "a", "year": "2001", "pages": 4, "size": "1.0 MB",
                "fileUrl": "/documents/x.pdf", "language": "Русский"
            }
        })),
    )
    .await
    .unwrap();
    let id = posted["data"]["id"].as_str().unwrap().to_string();

    let Json(deleted) = delete_media_handler(
        State(state.clone()),
        query(&[("type", "publications"), ("locale", "ru"), ("id", &id)]),
    )
    .await
    .unwrap();
    assert_eq!(deleted["success"], true);

    let data = get_collection(&state, "publications", "ru").await;
    assert!(
        data["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|i| i["id"] != id.as_str()),
        "deleted id must not come back"
    );

    // a second delete of the same id is a 404
    let err = delete_media_handler(
        State(state.clone()),
        query(&[("type", "publications"), ("locale", "ru"), ("id", &id)]),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Item not found");

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn delete_unknown_photo_returns_404() {
    let base = temp_base("delete_404");
    let state = build_state(&base);

    let err = delete_media_handler(
        State(state.clone()),
        query(&[("type", "photos"), ("locale", "en"), ("id", "999")]),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Item not found");
    assert_eq!(err.into_response().status(), 404);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn missing_parameters_are_rejected() {
    let base = temp_base("params");
    let state = build_state(&base);

    let err = post_media_handler(
        State(state.clone()),
        Json(json!({"type": "music", "locale": "ru"})),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required parameters: type, locale, item"
    );

    let err = delete_media_handler(
        State(state.clone()),
        query(&[("type", "photos"), ("locale", "ru")]),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required parameters: type, locale, id"
    );

    let err = post_media_handler(
        State(state.clone()),
        Json(json!({"type": "paintings", "locale": "ru", "item": {"title": "t"}})),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid type or locale");

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn locales_are_isolated() {
    let base = temp_base("locales");
    let state = build_state(&base);

    let before = get_collection(&state, "photos", "ru").await;
    let ru_count = before["items"].as_array().unwrap().len();

    post_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "photos",
            "locale": "en",
            "item": {"title": "Only english", "src": "/photos/original/e.jpg", "description": "d", "year": "2000"}
        })),
    )
    .await
    .unwrap();

    let after = get_collection(&state, "photos", "ru").await;
    assert_eq!(after["items"].as_array().unwrap().len(), ru_count);
    let en = get_collection(&state, "photos", "en").await;
    assert!(en["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["title"] == "Only english"));

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn absent_catalog_file_serves_defaults() {
    let base = temp_base("defaults");
    let state = build_state(&base);

    let data = get_collection(&state, "music", "ru").await;
    assert_eq!(data["tracks"].as_array().unwrap().len(), 6);
    assert_eq!(data["listTitle"], "Список произведений");

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn corrupt_catalog_file_serves_defaults() {
    let base = temp_base("corrupt");
    let data_dir = base.join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("mediaData.json"), "{ not json").unwrap();
    let state = build_state(&base);

    let Json(body) = get_media_handler(State(state.clone()), query(&[]))
        .await
        .expect("GET should degrade, not fail");
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["en"]["music"]["tracks"].as_array().unwrap().len(),
        6
    );

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn first_write_creates_the_file() {
    let base = temp_base("first_write");
    let state = build_state(&base);
    let path = base.join("data").join("mediaData.json");
    assert!(!path.exists());

    post_media_handler(
        State(state.clone()),
        Json(json!({
            "type": "music",
            "locale": "en",
            "item": {"title": "t", "composer": "c", "src": "/audio/t.mp3", "duration": "1:01"}
        })),
    )
    .await
    .unwrap();

    assert!(path.exists(), "catalog file appears on first write");
    let text = std::fs::read_to_string(&path).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    // defaults were folded into the persisted document
    assert_eq!(doc["ru"]["music"]["tracks"].as_array().unwrap().len(), 6);
    assert_eq!(doc["en"]["music"]["tracks"].as_array().unwrap().len(), 7);

    let _ = std::fs::remove_dir_all(&base);
}
