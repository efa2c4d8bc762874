pub mod geo;
pub mod media;
pub mod upload;

pub use geo::geo_handler;
pub use media::{delete_media_handler, get_media_handler, post_media_handler, put_media_handler};
pub use upload::{
    upload_audio_handler, upload_document_handler, upload_photo_handler, upload_preflight_handler,
    upload_video_handler,
};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Everything a route can fail with, rendered as the
/// `{"success":false,"error":...}` envelope the admin UI expects.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Item not found")]
    ItemNotFound,
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ItemNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub fn success(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
