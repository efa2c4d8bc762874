use crate::catalog::CatalogHandle;
use crate::derived::JobQueue;
use crate::upload::FileStore;

// Every field is a cheap-clone handle; the mutable state itself lives
// behind the catalog task.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogHandle,
    pub jobs: JobQueue,
    pub store: FileStore,
    pub http: reqwest::Client,
    pub ffmpeg_enabled: bool,
}
