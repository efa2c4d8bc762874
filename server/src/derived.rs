use crate::catalog::CatalogHandle;
use crate::models::{Locale, MediaItem};
use image::{imageops::FilterType, ImageOutputFormat};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Command;
use tokio::sync::mpsc;

// Derived sizes written for every uploaded photo, keyed by the directory
// they land in under public/photos/. Files keep the original's filename so
// the /photos/<size>/ URL mirrors /photos/original/.
const PHOTO_SIZES: [(&str, u32); 3] = [("thumbnails", 300), ("medium", 800), ("large", 1600)];

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Post-processing work decoupled from the upload/response path. Jobs are
/// queued at upload or POST time and drained by a single worker task.
#[derive(Debug, Clone)]
pub enum DerivedJob {
    PhotoSizes { filename: String },
    VideoPoster { filename: String },
    TrackDuration {
        locale: Locale,
        track_id: String,
        src: String,
    },
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<DerivedJob>,
}

impl JobQueue {
    pub fn enqueue(&self, job: DerivedJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("derived-asset worker is gone, dropping job");
        }
    }
}

pub struct WorkerContext {
    pub catalog: CatalogHandle,
    pub public_dir: PathBuf,
    pub ffmpeg_enabled: bool,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

pub fn spawn_worker(ctx: WorkerContext) -> JobQueue {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(ctx, rx));
    JobQueue { tx }
}

async fn run(ctx: WorkerContext, mut rx: mpsc::UnboundedReceiver<DerivedJob>) {
    while let Some(job) = rx.recv().await {
        let mut attempt = 1;
        loop {
            match process(&ctx, &job).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!("derived job attempt {} failed: {} ({:?})", attempt, e, job);
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("giving up on derived job {:?}: {}", job, e);
                    break;
                }
            }
        }
    }
}

async fn process(ctx: &WorkerContext, job: &DerivedJob) -> Result<(), String> {
    match job {
        DerivedJob::PhotoSizes { filename } => generate_photo_sizes(ctx, filename),
        DerivedJob::VideoPoster { filename } => generate_video_poster(ctx, filename).await,
        DerivedJob::TrackDuration {
            locale,
            track_id,
            src,
        } => update_track_duration(ctx, *locale, track_id, src).await,
    }
}

fn generate_photo_sizes(ctx: &WorkerContext, filename: &str) -> Result<(), String> {
    let src = ctx
        .public_dir
        .join("photos")
        .join("original")
        .join(filename);
    let img = image::open(&src).map_err(|e| e.to_string())?;

    for (dir, width) in PHOTO_SIZES {
        let out_dir = ctx.public_dir.join("photos").join(dir);
        std::fs::create_dir_all(&out_dir).map_err(|e| e.to_string())?;
        let out_path = out_dir.join(filename);
        if out_path.exists() {
            continue;
        }

        let resized = img.resize(width, width, FilterType::Lanczos3);
        // re-encode as JPEG; alpha channels are flattened first
        let flat = image::DynamicImage::ImageRgb8(resized.to_rgb8());
        let tmp_path = tmp_sibling(&out_path);
        let mut out_file = std::fs::File::create(&tmp_path).map_err(|e| e.to_string())?;
        flat.write_to(
            &mut std::io::BufWriter::new(&mut out_file),
            ImageOutputFormat::Jpeg(88),
        )
        .map_err(|e| e.to_string())?;
        std::fs::rename(&tmp_path, &out_path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn generate_video_poster(ctx: &WorkerContext, filename: &str) -> Result<(), String> {
    if !ctx.ffmpeg_enabled {
        tracing::debug!("ffmpeg disabled, skipping poster for {}", filename);
        return Ok(());
    }
    let src = ctx
        .public_dir
        .join("videos")
        .join("original")
        .join(filename);
    let out_dir = ctx.public_dir.join("videos").join("posters");
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| e.to_string())?;
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let out_path = out_dir.join(format!("{}.jpg", stem));
    if out_path.exists() {
        return Ok(());
    }

    // grab a frame one second in, unless the clip is shorter than that
    let duration = probe_duration_secs(&ctx.ffprobe_path, &src).await;
    let seek_secs = match duration {
        Some(d) if d > 3.0 => 1,
        _ => 0,
    };

    let tmp_path = tmp_sibling(&out_path);
    let output = Command::new(&ctx.ffmpeg_path)
        .args([
            "-ss",
            &seek_secs.to_string(),
            "-i",
            src.to_string_lossy().as_ref(),
            "-frames:v",
            "1",
            "-q:v",
            "2",
            "-vf",
            "scale=640:-1",
            "-y",
            tmp_path.to_string_lossy().as_ref(),
        ])
        .output()
        .await
        .map_err(|_| "failed to spawn ffmpeg".to_string())?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        tracing::error!("ffmpeg failed for {}: {}", filename, stderr);
        return Err("ffmpeg failed".to_string());
    }
    std::fs::rename(&tmp_path, &out_path).map_err(|e| e.to_string())?;
    Ok(())
}

async fn update_track_duration(
    ctx: &WorkerContext,
    locale: Locale,
    track_id: &str,
    src: &str,
) -> Result<(), String> {
    if !ctx.ffmpeg_enabled {
        tracing::debug!("ffprobe disabled, skipping duration for track {}", track_id);
        return Ok(());
    }
    // remotely hosted tracks cannot be probed locally
    if src.starts_with("http://") || src.starts_with("https://") {
        tracing::debug!("track {} src is remote, skipping duration probe", track_id);
        return Ok(());
    }

    let path = ctx.public_dir.join(src.trim_start_matches('/'));
    let secs = probe_duration_secs(&ctx.ffprobe_path, &path)
        .await
        .ok_or_else(|| format!("could not probe duration of {}", path.display()))?;
    let formatted = format_duration(secs);

    let doc = ctx.catalog.document().await.map_err(|e| e.to_string())?;
    let Some(track) = doc
        .locale(locale)
        .music
        .tracks
        .iter()
        .find(|t| t.id == track_id)
    else {
        // record was deleted in the meantime; nothing to update
        return Ok(());
    };
    let mut track = track.clone();
    track.duration = Some(formatted);
    ctx.catalog
        .replace(locale, MediaItem::Track(track))
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

pub(crate) async fn probe_duration_secs(ffprobe_path: &str, path: &Path) -> Option<f64> {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            path.to_string_lossy().as_ref(),
        ])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}

/// `"M:SS"`, the format the music player expects.
pub(crate) fn format_duration(secs: f64) -> String {
    let total = secs.round().max(0.0) as i64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    path.with_extension(format!("jpg.{}.tmp", nanos))
}
