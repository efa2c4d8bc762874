use crate::config::AppConfig;
use crate::handlers;
use crate::handlers::upload::MAX_UPLOAD_BODY_BYTES;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, get_service, post, MethodRouter};
use axum::Router;
use image::{ImageOutputFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub fn load_config(cli_path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    use ::config::{builder::DefaultState, ConfigBuilder, File};

    let mut builder = ConfigBuilder::<DefaultState>::default();
    let mut chosen: Option<PathBuf> = None;

    // If CLI path is provided, use it as-is; let deserialization fail if format is wrong.
    if let Some(p) = cli_path {
        chosen = Some(p);
    } else {
        // Strict search: only look for .json files in known locations
        let push_if_exists = |p: PathBuf| -> Option<PathBuf> {
            if p.exists() {
                Some(p)
            } else {
                None
            }
        };

        // Prefer ./config.json (monorepo server dir)
        if let Ok(cwd) = std::env::current_dir() {
            if let Some(found) = push_if_exists(cwd.join("config.json")) {
                chosen = Some(found);
            }
        }
        // server/config.json
        if chosen.is_none() {
            if let Some(found) = push_if_exists(PathBuf::from("server/config.json")) {
                chosen = Some(found);
            }
        }
        // XDG config.json
        if chosen.is_none() {
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                let p = PathBuf::from(xdg).join("terteryan-server/config.json");
                if let Some(found) = push_if_exists(p) {
                    chosen = Some(found);
                }
            }
            if chosen.is_none() {
                if let Some(home) = dirs::home_dir() {
                    let p = home.join(".config/terteryan-server/config.json");
                    if let Some(found) = push_if_exists(p) {
                        chosen = Some(found);
                    }
                }
            }
        }
        // /etc/terteryan-server/config.json
        if chosen.is_none() {
            if let Some(found) = push_if_exists(PathBuf::from("/etc/terteryan-server/config.json")) {
                chosen = Some(found);
            }
        }
    }

    if let Some(cfg_path) = chosen {
        tracing::info!("Using configuration file: {}", cfg_path.display());
        builder = builder.add_source(File::from(cfg_path));
    } else {
        return Err("No config.json found. Provide --config <file.json> or place config.json in ./, server/, XDG (~/.config/terteryan-server/), or /etc/terteryan-server/".into());
    }

    let settings = builder
        .build()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;
    let cfg: AppConfig = settings
        .try_deserialize()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;
    Ok(cfg)
}

/// Create the upload and derived directory tree and a gray placeholder
/// image the seed data references.
pub fn prepare_public_dirs(public_dir: &Path) {
    for dir in [
        "photos/original",
        "photos/thumbnails",
        "photos/medium",
        "photos/large",
        "videos/original",
        "videos/posters",
        "audio/original",
        "documents/original",
    ] {
        let _ = std::fs::create_dir_all(public_dir.join(dir));
    }
    tracing::info!("Public directory: {}", public_dir.display());

    let placeholder_path = public_dir.join("placeholder.jpg");
    if !placeholder_path.exists() {
        if let Ok(mut buf) = std::fs::File::create(&placeholder_path) {
            let img = RgbImage::from_pixel(16, 16, image::Rgb([200u8, 200u8, 200u8]));
            let _ = image::DynamicImage::ImageRgb8(img).write_to(
                &mut std::io::BufWriter::new(&mut buf),
                ImageOutputFormat::Jpeg(75),
            );
        }
    }
}

pub fn build_public_service(public_dir: PathBuf) -> MethodRouter {
    get_service(ServeDir::new(public_dir)).handle_error(|e: std::io::Error| async move {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", e),
        )
    })
}

/// The full application router: media API, upload routes, geo lookup, and
/// the public static tree as fallback.
pub fn build_router(state: Arc<AppState>, public_dir: PathBuf) -> Router {
    Router::new()
        .route(
            "/api/media",
            get(handlers::get_media_handler)
                .post(handlers::post_media_handler)
                .put(handlers::put_media_handler)
                .delete(handlers::delete_media_handler),
        )
        .route(
            "/api/upload/photo",
            post(handlers::upload_photo_handler).options(handlers::upload_preflight_handler),
        )
        .route(
            "/api/upload/video",
            post(handlers::upload_video_handler).options(handlers::upload_preflight_handler),
        )
        .route(
            "/api/upload/audio",
            post(handlers::upload_audio_handler).options(handlers::upload_preflight_handler),
        )
        .route(
            "/api/upload/document",
            post(handlers::upload_document_handler).options(handlers::upload_preflight_handler),
        )
        .route("/api/geo", get(handlers::geo_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .fallback_service(build_public_service(public_dir))
        .with_state(state)
}

pub fn build_cors(config: &AppConfig) -> CorsLayer {
    let mut cors_layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.cors_allow_credentials.unwrap_or(false) {
        cors_layer = cors_layer.allow_credentials(true);
    }

    if let Some(origins) = config.cors_allowed_origins.clone() {
        if origins.is_empty() {
            cors_layer = cors_layer.allow_origin(Any);
        } else if origins.len() == 1 {
            match HeaderValue::from_str(&origins[0]) {
                Ok(hv) => {
                    cors_layer = cors_layer.allow_origin(tower_http::cors::AllowOrigin::exact(hv))
                }
                Err(_) => cors_layer = cors_layer.allow_origin(Any),
            }
        } else {
            let list: Vec<HeaderValue> = origins
                .into_iter()
                .filter_map(|s| HeaderValue::from_str(&s).ok())
                .collect();
            if !list.is_empty() {
                cors_layer = cors_layer.allow_origin(tower_http::cors::AllowOrigin::list(list));
            } else {
                cors_layer = cors_layer.allow_origin(Any);
            }
        }
    } else {
        cors_layer = cors_layer.allow_origin(Any);
    }

    cors_layer
}

pub fn log_startup_info(config: &AppConfig) {
    tracing::info!(
        "catalog file: {}",
        config.catalog_path().display()
    );
    tracing::info!("public root: {}", config.public_dir);
    tracing::info!(
        "ffmpeg: {}",
        if config.ffmpeg_enabled.unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        }
    );
    match config.sweep_interval_minutes {
        Some(mins) => tracing::info!("orphan sweep: every {} minutes", mins),
        None => tracing::info!("orphan sweep: manual only"),
    }
}
