use crate::catalog::CatalogHandle;
use crate::derived::{format_duration, probe_duration_secs};
use crate::models::{Locale, MediaCatalog, MediaItem};
use crate::preloader::ImagePreloader;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SWEEP_GRACE_HOURS: u64 = 24;

// Directories holding uploaded originals, relative to the public root.
const UPLOAD_DIRS: [&str; 4] = [
    "photos/original",
    "videos/original",
    "audio/original",
    "documents/original",
];

// Derived photo directories handled by clean-derived / fix-derived.
const DERIVED_PHOTO_DIRS: [&str; 3] = ["photos/thumbnails", "photos/medium", "photos/large"];

#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
}

/// Delete uploaded files no catalog record references, once they are older
/// than the grace period. The grace period keeps a freshly uploaded file
/// alive while the admin is still composing its catalog record.
pub async fn sweep_orphans(
    catalog: &CatalogHandle,
    public_dir: &Path,
    grace: Duration,
) -> Result<SweepReport, Box<dyn Error>> {
    let doc = catalog.document().await?;
    let referenced = referenced_urls(&doc);
    let mut report = SweepReport::default();

    for dir in UPLOAD_DIRS {
        let abs = public_dir.join(dir);
        let mut read_dir = match tokio::fs::read_dir(&abs).await {
            Ok(rd) => rd,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == ".gitkeep" {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !meta.is_file() {
                continue;
            }
            report.scanned += 1;

            let url = format!("/{}/{}", dir, name);
            if referenced.contains(&url) {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .unwrap_or(Duration::ZERO);
            if age < grace {
                continue;
            }

            let kind = mime_guess::from_path(entry.path()).first_or_octet_stream();
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::info!("removed orphan {} ({})", url, kind);
                }
                Err(e) => tracing::warn!("could not remove orphan {}: {}", url, e),
            }
        }
    }
    Ok(report)
}

// Every URL any record points at, across both locales. Derived-quality
// URLs count as references too.
fn referenced_urls(doc: &MediaCatalog) -> HashSet<String> {
    let mut urls = HashSet::new();
    for locale in [Locale::Ru, Locale::En] {
        let tree = doc.locale(locale);
        for track in &tree.music.tracks {
            urls.insert(track.src.clone());
        }
        for video in &tree.video.items {
            urls.insert(video.thumbnail.clone());
            urls.insert(video.video_url.clone());
        }
        for photo in &tree.photos.items {
            urls.insert(photo.src.clone());
            for derived in [&photo.thumbnail_url, &photo.medium_url, &photo.large_url] {
                if let Some(u) = derived {
                    urls.insert(u.clone());
                }
            }
        }
        for publication in &tree.publications.items {
            urls.insert(publication.file_url.clone());
        }
    }
    urls
}

/// Blank every derived photo file, keeping `.gitkeep` markers. The files
/// themselves stay in place as zero-byte placeholders for fix-derived.
pub fn clean_derived(public_dir: &Path) -> Result<usize, Box<dyn Error>> {
    let mut cleaned = 0;
    for dir in DERIVED_PHOTO_DIRS {
        let abs = public_dir.join(dir);
        let entries = match std::fs::read_dir(&abs) {
            Ok(e) => e,
            Err(_) => {
                println!("directory not found: {}", dir);
                continue;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == ".gitkeep" {
                continue;
            }
            match std::fs::write(entry.path(), "") {
                Ok(()) => {
                    cleaned += 1;
                    println!("cleared {}/{}", dir, name);
                }
                Err(e) => eprintln!("failed to clear {}/{}: {}", dir, name, e),
            }
        }
    }
    println!("cleaned {} derived files", cleaned);
    Ok(cleaned)
}

/// Copy originals over missing or empty thumbnail files. A stopgap for
/// photos whose derived sizes were blanked or never generated.
pub fn fix_derived(public_dir: &Path) -> Result<usize, Box<dyn Error>> {
    let originals = public_dir.join("photos").join("original");
    let thumbnails = public_dir.join("photos").join("thumbnails");
    std::fs::create_dir_all(&thumbnails)?;

    let mut copied = 0;
    for entry in std::fs::read_dir(&originals)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".gitkeep" || !entry.path().is_file() {
            continue;
        }
        let target = thumbnails.join(&name);
        let size = std::fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
            println!("copied {}", name);
        }
    }
    println!("fixed {} thumbnail files", copied);
    Ok(copied)
}

/// Probe and persist the duration of every local audio track that has none,
/// in both locales.
pub async fn update_durations(
    catalog: &CatalogHandle,
    public_dir: &Path,
    ffprobe_path: &str,
) -> Result<usize, Box<dyn Error>> {
    let mut updated = 0;
    for locale in [Locale::Ru, Locale::En] {
        let doc = catalog.document().await?;
        for track in &doc.locale(locale).music.tracks {
            if track.duration.is_some() {
                continue;
            }
            if track.src.starts_with("http://") || track.src.starts_with("https://") {
                println!("skipping {} (remote source)", track.title);
                continue;
            }
            let path = public_dir.join(track.src.trim_start_matches('/'));
            let Some(secs) = probe_duration_secs(ffprobe_path, &path).await else {
                println!("could not probe {} ({})", track.title, path.display());
                continue;
            };
            let mut track = track.clone();
            let title = track.title.clone();
            let duration = format_duration(secs);
            track.duration = Some(duration.clone());
            catalog.replace(locale, MediaItem::Track(track)).await?;
            updated += 1;
            println!("updated {} ({}): {}", title, locale.as_str(), duration);
        }
    }
    println!("updated {} tracks", updated);
    Ok(updated)
}

/// Prefetch every image URL the catalog of a running server references,
/// warming whatever cache sits in front of it.
pub async fn warm_cache(base_url: &str) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::new();
    let base = base_url.trim_end_matches('/');
    let body: Value = client
        .get(format!("{}/api/media", base))
        .send()
        .await?
        .json()
        .await?;

    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: Option<&str>| {
        if let Some(u) = url {
            let absolute = if u.starts_with('/') {
                format!("{}{}", base, u)
            } else {
                u.to_string()
            };
            if !urls.contains(&absolute) {
                urls.push(absolute);
            }
        }
    };
    for locale in ["ru", "en"] {
        let tree = &body["data"][locale];
        if let Some(items) = tree["photos"]["items"].as_array() {
            for item in items {
                for field in ["src", "thumbnailUrl", "mediumUrl", "largeUrl"] {
                    push(item[field].as_str());
                }
            }
        }
        if let Some(items) = tree["video"]["items"].as_array() {
            for item in items {
                push(item["thumbnail"].as_str());
            }
        }
    }

    let preloader = ImagePreloader::new(client);
    let progress = preloader.preload_images(&urls).await;
    println!(
        "warmed {} images: {} loaded, {} failed",
        progress.total, progress.loaded, progress.failed
    );
    Ok(())
}
