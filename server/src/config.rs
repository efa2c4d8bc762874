use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    // catalog JSON lives at {data_dir}/mediaData.json
    pub data_dir: String,
    // uploaded files and seeded media, served as the static root
    pub public_dir: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ffmpeg_enabled: Option<bool>,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allow_credentials: Option<bool>,
    // orphan sweep: how old an unreferenced upload must be before removal,
    // and how often the background sweep runs (absent = never)
    pub sweep_grace_hours: Option<u64>,
    pub sweep_interval_minutes: Option<u64>,
}

impl AppConfig {
    pub fn catalog_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("mediaData.json")
    }
}
