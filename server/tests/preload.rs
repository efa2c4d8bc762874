use std::path::PathBuf;
use std::sync::Arc;

use terteryan_server::catalog::CatalogHandle;
use terteryan_server::derived::{spawn_worker, WorkerContext};
use terteryan_server::preloader::ImagePreloader;
use terteryan_server::startup::build_router;
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

// A static-file server with `count` small images at /photos/img<N>.jpg.
async fn spawn_image_server(base: &PathBuf, count: usize) -> String {
    let public_dir = base.join("public");
    let photos = public_dir.join("photos");
    std::fs::create_dir_all(&photos).unwrap();
    for i in 0..count {
        std::fs::write(photos.join(format!("img{}.jpg", i)), b"jpegish bytes").unwrap();
    }

    let catalog = CatalogHandle::spawn(base.join("data").join("mediaData.json"));
    let jobs = spawn_worker(WorkerContext {
        catalog: catalog.clone(),
        public_dir: public_dir.clone(),
        ffmpeg_enabled: false,
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
    });
    let state = Arc::new(AppState {
        catalog,
        jobs,
        store: FileStore::new(public_dir.clone()),
        http: reqwest::Client::new(),
        ffmpeg_enabled: false,
    });
    let app = build_router(state, public_dir);
    let server =
        axum::Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    format!("http://{}", addr)
}

#[tokio::test]
async fn counts_every_url_exactly_once() {
    let base = temp_base("preload_mixed");
    let server = spawn_image_server(&base, 3).await;

    let urls: Vec<String> = vec![
        format!("{}/photos/img0.jpg", server),
        format!("{}/photos/img1.jpg", server),
        format!("{}/photos/missing-a.jpg", server),
        format!("{}/photos/img2.jpg", server),
        format!("{}/photos/missing-b.jpg", server),
    ];

    let preloader = ImagePreloader::new(reqwest::Client::new());
    let progress = preloader.preload_images(&urls).await;

    assert_eq!(progress.total, 5);
    assert_eq!(progress.loaded, 3);
    assert_eq!(progress.failed, 2);
    assert_eq!(progress.loaded + progress.failed, urls.len());
    assert_eq!(progress.progress, 100);
    assert!(progress.is_complete);
    assert!(!progress.is_loading);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn progress_is_complete_across_batch_boundaries() {
    let base = temp_base("preload_batches");
    let server = spawn_image_server(&base, 7).await;

    // 7 urls = batches of 3, 3 and 1
    let urls: Vec<String> = (0..7)
        .map(|i| format!("{}/photos/img{}.jpg", server, i))
        .collect();
    let preloader = ImagePreloader::new(reqwest::Client::new());
    let progress = preloader.preload_images(&urls).await;

    assert_eq!(progress.total, 7);
    assert_eq!(progress.loaded, 7);
    assert_eq!(progress.failed, 0);
    assert_eq!(progress.progress, 100);
    assert!(progress.is_complete);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn loaded_urls_short_circuit_on_repeat_calls() {
    let base = temp_base("preload_repeat");
    let server = spawn_image_server(&base, 2).await;

    let good = format!("{}/photos/img0.jpg", server);
    let also_good = format!("{}/photos/img1.jpg", server);
    let bad = format!("{}/photos/never.jpg", server);
    let urls = vec![good.clone(), also_good, bad.clone()];

    let preloader = ImagePreloader::new(reqwest::Client::new());
    let first = preloader.preload_images(&urls).await;
    assert_eq!((first.loaded, first.failed), (2, 1));
    assert!(preloader.is_preloaded(&good).await);
    assert!(!preloader.is_preloaded(&bad).await);

    // a second pass still settles every url and reaches 100 again; the
    // loaded ones come from the memo, the failed one is retried
    let second = preloader.preload_images(&urls).await;
    assert_eq!((second.loaded, second.failed), (2, 1));
    assert_eq!(second.progress, 100);
    assert!(second.is_complete);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn empty_input_resolves_without_work() {
    let preloader = ImagePreloader::new(reqwest::Client::new());
    let progress = preloader.preload_images(&[]).await;
    assert_eq!(progress.total, 0);
    assert!(!progress.is_loading);
}
