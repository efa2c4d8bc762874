use super::{success, ApiError};
use crate::derived::DerivedJob;
use crate::state::AppState;
use crate::upload::{check_required_metadata, validate_file, Category};
use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

// The request body cap on the upload routes; generous enough for the
// largest per-category limit (500MB video) plus multipart framing. The
// real limits are enforced per category by the validator.
pub const MAX_UPLOAD_BODY_BYTES: usize = 520 * 1024 * 1024;

pub async fn upload_photo_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    handle_upload(state, Category::Photo, multipart).await
}

pub async fn upload_video_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    handle_upload(state, Category::Video, multipart).await
}

pub async fn upload_audio_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    handle_upload(state, Category::Audio, multipart).await
}

pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    handle_upload(state, Category::Document, multipart).await
}

// CORS preflight for the upload routes.
pub async fn upload_preflight_handler() -> Json<Value> {
    Json(json!({}))
}

struct IncomingFile {
    original_name: String,
    declared_type: String,
    bytes: Vec<u8>,
}

async fn handle_upload(
    state: Arc<AppState>,
    category: Category,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file: Option<IncomingFile> = None;
    let mut metadata = json!({});

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or("") {
            "file" => {
                let original_name = field.file_name().unwrap_or("").to_string();
                let declared_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::warn!("failed to read upload body: {}", e);
                    ApiError::BadRequest("Failed to read file".to_string())
                })?;
                file = Some(IncomingFile {
                    original_name,
                    declared_type,
                    bytes: bytes.to_vec(),
                });
            }
            "metadata" => {
                // a metadata field that is not valid JSON is tolerated as an
                // empty object
                if let Ok(text) = field.text().await {
                    match serde_json::from_str(&text) {
                        Ok(value) => metadata = value,
                        Err(e) => tracing::warn!("failed to parse upload metadata: {}", e),
                    }
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    // required metadata and limits are checked before anything touches disk,
    // so a rejected upload leaves no orphan file behind
    check_required_metadata(category, &metadata).map_err(ApiError::BadRequest)?;
    validate_file(category, &file.declared_type, file.bytes.len() as u64)
        .map_err(ApiError::BadRequest)?;

    let stored = state
        .store
        .save(
            category,
            &file.original_name,
            &file.declared_type,
            &file.bytes,
            metadata,
        )
        .await
        .map_err(|e| {
            tracing::error!("{} upload failed to store file: {}", category.as_str(), e);
            ApiError::Internal("Internal server error".to_string())
        })?;

    match category {
        Category::Photo => state.jobs.enqueue(DerivedJob::PhotoSizes {
            filename: stored.filename.clone(),
        }),
        Category::Video if state.ffmpeg_enabled => state.jobs.enqueue(DerivedJob::VideoPoster {
            filename: stored.filename.clone(),
        }),
        _ => {}
    }

    let data = serde_json::to_value(&stored).unwrap_or(Value::Null);
    Ok(success(data))
}
