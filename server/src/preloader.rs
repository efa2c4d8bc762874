use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// Images are warmed a few at a time; within a batch every request runs
// concurrently, and a short pause separates batches.
const BATCH_SIZE: usize = 3;
const BATCH_PAUSE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadProgress {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    /// 0-100
    pub progress: u32,
    pub is_complete: bool,
    pub is_loading: bool,
}

#[derive(Default)]
struct PreloaderState {
    // url -> loaded; a failed url is retried on the next call, a loaded one
    // short-circuits
    statuses: HashMap<String, bool>,
    progress: PreloadProgress,
}

/// Best-effort cache warmer: fetches image URLs in small concurrent batches
/// and keeps an aggregate progress count. Failures are counted, never
/// propagated, and never retried within a call.
#[derive(Clone)]
pub struct ImagePreloader {
    client: reqwest::Client,
    inner: Arc<Mutex<PreloaderState>>,
}

impl ImagePreloader {
    pub fn new(client: reqwest::Client) -> ImagePreloader {
        ImagePreloader {
            client,
            inner: Arc::new(Mutex::new(PreloaderState::default())),
        }
    }

    pub async fn progress(&self) -> PreloadProgress {
        self.inner.lock().await.progress.clone()
    }

    pub async fn is_preloaded(&self, url: &str) -> bool {
        self.inner
            .lock()
            .await
            .statuses
            .get(url)
            .copied()
            .unwrap_or(false)
    }

    /// Warm every URL in `urls` and return the final progress. The counters
    /// are updated after each individual fetch settles, not just per batch,
    /// so a concurrent observer sees progress move inside a batch too.
    pub async fn preload_images(&self, urls: &[String]) -> PreloadProgress {
        if urls.is_empty() {
            return self.progress().await;
        }

        {
            let mut inner = self.inner.lock().await;
            inner.progress = PreloadProgress {
                total: urls.len(),
                is_loading: true,
                ..PreloadProgress::default()
            };
        }

        for batch in urls.chunks(BATCH_SIZE) {
            let fetches = batch.iter().map(|url| self.preload_one(url, urls.len()));
            futures::future::join_all(fetches).await;
            tokio::time::sleep(BATCH_PAUSE).await;
        }

        let mut inner = self.inner.lock().await;
        inner.progress.is_complete = true;
        inner.progress.is_loading = false;
        inner.progress.clone()
    }

    async fn preload_one(&self, url: &str, total: usize) {
        let already_loaded = {
            self.inner
                .lock()
                .await
                .statuses
                .get(url)
                .copied()
                .unwrap_or(false)
        };
        let ok = if already_loaded {
            true
        } else {
            self.fetch(url).await
        };

        let mut inner = self.inner.lock().await;
        inner.statuses.insert(url.to_string(), ok);
        let progress = &mut inner.progress;
        if ok {
            progress.loaded += 1;
        } else {
            progress.failed += 1;
        }
        let settled = progress.loaded + progress.failed;
        progress.progress = ((settled as f64 / total as f64) * 100.0).round() as u32;
        progress.is_complete = settled == total;
        progress.is_loading = settled < total;
    }

    async fn fetch(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response.bytes().await.is_ok(),
            _ => false,
        }
    }
}
