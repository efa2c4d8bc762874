use super::validate::Category;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Descriptor returned to the caller after a successful store, with the
/// caller-supplied metadata passed through unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub metadata: Value,
}

/// Writes validated upload bytes under the public root, one subdirectory
/// per category.
#[derive(Clone)]
pub struct FileStore {
    public_dir: PathBuf,
}

impl FileStore {
    pub fn new(public_dir: PathBuf) -> FileStore {
        FileStore { public_dir }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Persist the bytes under `{category}_{millis}_{uuid}{ext}` in the
    /// category's `original/` directory. The write goes straight to the
    /// final path; a crash mid-write can leave a truncated file, which the
    /// reconciliation sweep eventually collects.
    pub async fn save(
        &self,
        category: Category,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
        metadata: Value,
    ) -> std::io::Result<StoredFile> {
        let id = Uuid::new_v4().to_string();
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let filename = format!("{}_{}_{}{}", category.as_str(), millis, id, extension);

        let dir = self
            .public_dir
            .join(category.directory())
            .join("original");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), bytes).await?;

        Ok(StoredFile {
            id,
            filename: filename.clone(),
            original_name: original_name.to_string(),
            url: format!("/{}/original/{}", category.directory(), filename),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (FileStore, PathBuf) {
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("tmp")
            .join(format!(
                "store_test_{}",
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ));
        (FileStore::new(base.clone()), base)
    }

    #[tokio::test]
    async fn stores_under_generated_name() {
        let (store, base) = temp_store();
        let stored = store
            .save(
                Category::Photo,
                "портрет.jpg",
                "image/jpeg",
                b"not really a jpeg",
                json!({"title": "t"}),
            )
            .await
            .unwrap();

        assert!(stored.filename.starts_with("photo_"));
        assert!(stored.filename.ends_with(".jpg"));
        assert!(stored.filename.contains(&stored.id));
        assert_eq!(stored.original_name, "портрет.jpg");
        assert_eq!(stored.url, format!("/photos/original/{}", stored.filename));
        assert_eq!(stored.size, 17);

        let on_disk = base.join("photos").join("original").join(&stored.filename);
        assert!(on_disk.exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn extensionless_names_get_no_suffix() {
        let (store, base) = temp_store();
        let stored = store
            .save(Category::Document, "README", "application/pdf", b"x", json!({}))
            .await
            .unwrap();
        assert!(!stored.filename.contains('.'));
        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn two_saves_never_collide() {
        let (store, base) = temp_store();
        let a = store
            .save(Category::Audio, "a.mp3", "audio/mpeg", b"a", json!({}))
            .await
            .unwrap();
        let b = store
            .save(Category::Audio, "a.mp3", "audio/mpeg", b"b", json!({}))
            .await
            .unwrap();
        assert_ne!(a.filename, b.filename);
        let _ = std::fs::remove_dir_all(&base);
    }
}
