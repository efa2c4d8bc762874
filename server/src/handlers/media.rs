use super::{success, ApiError};
use crate::catalog::CatalogError;
use crate::derived::DerivedJob;
use crate::models::{Locale, MediaItem, MediaKind};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

// GET /api/media?type=&locale=: the whole locale-keyed document, or one
// collection container when `type` is given. Read failures never surface
// here; the catalog task falls back to the built-in defaults.
pub async fn get_media_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let locale = parse_locale(q.get("locale"))?;

    let data = match q.get("type") {
        Some(t) => {
            let kind = MediaKind::parse(t)
                .ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))?;
            state.catalog.collection(locale, kind).await
        }
        None => state
            .catalog
            .document()
            .await
            .map(|doc| serde_json::to_value(doc).unwrap_or(Value::Null)),
    }
    .map_err(|e| {
        tracing::error!("GET media error: {}", e);
        ApiError::Internal("Failed to retrieve media data".to_string())
    })?;

    Ok(success(data))
}

// POST /api/media with body {type, locale, item}; appends and returns the
// stored item with its id filled in.
pub async fn post_media_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let (kind, locale, item) = parse_mutation(&body, "Missing required parameters: type, locale, item")?;
    let item = MediaItem::from_value(kind, item).map_err(|e| {
        ApiError::BadRequest(format!("Invalid item for type {}: {}", kind.as_str(), e))
    })?;

    let stored = state.catalog.append(locale, item).await.map_err(|e| {
        tracing::error!("POST media error: {}", e);
        ApiError::Internal("Failed to add media item".to_string())
    })?;

    // a track posted without a duration gets one probed in the background
    if let MediaItem::Track(track) = &stored {
        if track.duration.is_none() && state.ffmpeg_enabled {
            state.jobs.enqueue(DerivedJob::TrackDuration {
                locale,
                track_id: track.id.clone(),
                src: track.src.clone(),
            });
        }
    }

    Ok(success(stored.to_value()))
}

// PUT /api/media: full replace of the record matching item.id.
pub async fn put_media_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let message = "Missing required parameters: type, locale, item with id";
    let (kind, locale, item) = parse_mutation(&body, message)?;
    let has_id = item
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    let item = MediaItem::from_value(kind, item).map_err(|e| {
        ApiError::BadRequest(format!("Invalid item for type {}: {}", kind.as_str(), e))
    })?;

    let stored = state
        .catalog
        .replace(locale, item)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound => ApiError::ItemNotFound,
            other => {
                tracing::error!("PUT media error: {}", other);
                ApiError::Internal("Failed to update media item".to_string())
            }
        })?;

    Ok(success(stored.to_value()))
}

// DELETE /api/media?type=&locale=&id=
pub async fn delete_media_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let (Some(t), Some(l), Some(id)) = (q.get("type"), q.get("locale"), q.get("id")) else {
        return Err(ApiError::BadRequest(
            "Missing required parameters: type, locale, id".to_string(),
        ));
    };
    let kind = MediaKind::parse(t)
        .ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))?;
    let locale = Locale::parse(l)
        .ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))?;

    state
        .catalog
        .remove(locale, kind, id)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound => ApiError::ItemNotFound,
            other => {
                tracing::error!("DELETE media error: {}", other);
                ApiError::Internal("Failed to delete media item".to_string())
            }
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Item deleted successfully"
    })))
}

fn parse_locale(value: Option<&String>) -> Result<Locale, ApiError> {
    match value {
        Some(s) => {
            Locale::parse(s).ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))
        }
        None => Ok(Locale::Ru),
    }
}

fn parse_mutation(body: &Value, message: &str) -> Result<(MediaKind, Locale, Value), ApiError> {
    let kind = body.get("type").and_then(Value::as_str);
    let locale = body.get("locale").and_then(Value::as_str);
    let item = body.get("item").filter(|v| !v.is_null());
    let (Some(kind), Some(locale), Some(item)) = (kind, locale, item) else {
        return Err(ApiError::BadRequest(message.to_string()));
    };
    let kind = MediaKind::parse(kind)
        .ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))?;
    let locale = Locale::parse(locale)
        .ok_or_else(|| ApiError::BadRequest("Invalid type or locale".to_string()))?;
    Ok((kind, locale, item.clone()))
}
