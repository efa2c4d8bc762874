use crate::models::{Locale, MediaCatalog, MediaItem, MediaKind};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Item not found")]
    NotFound,
    #[error("failed to write catalog file: {0}")]
    Storage(#[from] std::io::Error),
    #[error("catalog task is gone")]
    Closed,
}

// All catalog access goes through one task owning the file, so overlapping
// read-modify-write cycles cannot lose each other's updates. Each command
// still re-reads the file and each mutation rewrites it whole; the document
// is small enough that this stays cheap.
enum Command {
    Document {
        reply: oneshot::Sender<MediaCatalog>,
    },
    Collection {
        locale: Locale,
        kind: MediaKind,
        reply: oneshot::Sender<Value>,
    },
    Append {
        locale: Locale,
        item: MediaItem,
        reply: oneshot::Sender<Result<MediaItem, CatalogError>>,
    },
    Replace {
        locale: Locale,
        item: MediaItem,
        reply: oneshot::Sender<Result<MediaItem, CatalogError>>,
    },
    Remove {
        locale: Locale,
        kind: MediaKind,
        id: String,
        reply: oneshot::Sender<Result<(), CatalogError>>,
    },
}

#[derive(Clone)]
pub struct CatalogHandle {
    tx: mpsc::Sender<Command>,
}

impl CatalogHandle {
    /// Spawn the owning task for the catalog file at `path`.
    pub fn spawn(path: PathBuf) -> CatalogHandle {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run(path, rx));
        CatalogHandle { tx }
    }

    pub async fn document(&self) -> Result<MediaCatalog, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Document { reply })
            .await
            .map_err(|_| CatalogError::Closed)?;
        rx.await.map_err(|_| CatalogError::Closed)
    }

    pub async fn collection(&self, locale: Locale, kind: MediaKind) -> Result<Value, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Collection { locale, kind, reply })
            .await
            .map_err(|_| CatalogError::Closed)?;
        rx.await.map_err(|_| CatalogError::Closed)
    }

    /// Append `item` to its collection, assigning an id when absent, and
    /// return the stored item.
    pub async fn append(&self, locale: Locale, item: MediaItem) -> Result<MediaItem, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Append { locale, item, reply })
            .await
            .map_err(|_| CatalogError::Closed)?;
        rx.await.map_err(|_| CatalogError::Closed)?
    }

    /// Replace the record with `item.id` wholesale.
    pub async fn replace(&self, locale: Locale, item: MediaItem) -> Result<MediaItem, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Replace { locale, item, reply })
            .await
            .map_err(|_| CatalogError::Closed)?;
        rx.await.map_err(|_| CatalogError::Closed)?
    }

    pub async fn remove(
        &self,
        locale: Locale,
        kind: MediaKind,
        id: &str,
    ) -> Result<(), CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Remove {
                locale,
                kind,
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(|_| CatalogError::Closed)?;
        rx.await.map_err(|_| CatalogError::Closed)?
    }
}

async fn run(path: PathBuf, mut rx: mpsc::Receiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Document { reply } => {
                let _ = reply.send(read_document(&path).await);
            }
            Command::Collection { locale, kind, reply } => {
                let doc = read_document(&path).await;
                let _ = reply.send(doc.locale(locale).section_value(kind));
            }
            Command::Append { locale, mut item, reply } => {
                let mut doc = read_document(&path).await;
                item.ensure_id();
                doc.locale_mut(locale).push(item.clone());
                let result = write_document(&path, &doc).await.map(|_| item);
                let _ = reply.send(result.map_err(CatalogError::from));
            }
            Command::Replace { locale, item, reply } => {
                let mut doc = read_document(&path).await;
                let result = if doc.locale_mut(locale).replace(&item) {
                    write_document(&path, &doc)
                        .await
                        .map(|_| item)
                        .map_err(CatalogError::from)
                } else {
                    Err(CatalogError::NotFound)
                };
                let _ = reply.send(result);
            }
            Command::Remove { locale, kind, id, reply } => {
                let mut doc = read_document(&path).await;
                let result = if doc.locale_mut(locale).remove(kind, &id) {
                    write_document(&path, &doc)
                        .await
                        .map_err(CatalogError::from)
                } else {
                    Err(CatalogError::NotFound)
                };
                let _ = reply.send(result);
            }
        }
    }
}

// Reads degrade to the built-in defaults; the file appears on first write.
async fn read_document(path: &Path) -> MediaCatalog {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("catalog file {} is not parseable: {}", path.display(), e);
                MediaCatalog::default_document()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => MediaCatalog::default_document(),
        Err(e) => {
            tracing::error!("failed to read catalog file {}: {}", path.display(), e);
            MediaCatalog::default_document()
        }
    }
}

async fn write_document(path: &Path, doc: &MediaCatalog) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // write next to the final path, then rename over it
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let tmp = path.with_extension(format!("json.{}.tmp", nanos));
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
