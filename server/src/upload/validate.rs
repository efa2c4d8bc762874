use serde_json::Value;

const MB: u64 = 1024 * 1024;

/// The four upload categories, each with its own limits, allow-list and
/// storage subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Photo,
    Video,
    Audio,
    Document,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Document => "document",
        }
    }

    /// Subdirectory of the public root this category's files live in.
    pub fn directory(&self) -> &'static str {
        match self {
            Category::Photo => "photos",
            Category::Video => "videos",
            Category::Audio => "audio",
            Category::Document => "documents",
        }
    }

    pub fn max_size(&self) -> u64 {
        match self {
            Category::Photo => 20 * MB,
            Category::Video => 500 * MB,
            Category::Audio => 50 * MB,
            Category::Document => 100 * MB,
        }
    }

    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            Category::Photo => &[
                "image/jpeg",
                "image/jpg",
                "image/png",
                "image/webp",
                "image/avif",
            ],
            Category::Video => &[
                "video/mp4",
                "video/mov",
                "video/avi",
                "video/mkv",
                "video/webm",
            ],
            Category::Audio => &[
                "audio/mpeg",
                "audio/mp3",
                "audio/wav",
                "audio/flac",
                "audio/aac",
            ],
            Category::Document => &[
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ],
        }
    }

    /// Metadata fields the route requires before any byte is written.
    pub fn required_metadata(&self) -> &'static [&'static str] {
        match self {
            Category::Photo | Category::Video => &["title", "description", "year"],
            Category::Audio => &["title", "composer", "year"],
            Category::Document => &["title", "author", "type", "year", "language"],
        }
    }
}

/// Check the declared MIME type and byte size against the category's limits.
/// The declared type is trusted as-is; there is no content sniffing, so a
/// mislabeled file goes through. That is an accepted property of this
/// surface, not something to tighten here.
pub fn validate_file(category: Category, declared_type: &str, size: u64) -> Result<(), String> {
    if size > category.max_size() {
        return Err(format!(
            "File size exceeds maximum allowed size of {}MB",
            category.max_size() / MB
        ));
    }
    if !category.allowed_types().contains(&declared_type) {
        return Err(format!(
            "File type {} is not allowed. Allowed types: {}",
            declared_type,
            category.allowed_types().join(", ")
        ));
    }
    Ok(())
}

/// Reject uploads whose metadata object is missing any required field
/// (absent, null or empty string).
pub fn check_required_metadata(category: Category, metadata: &Value) -> Result<(), String> {
    let missing = category
        .required_metadata()
        .iter()
        .any(|field| match metadata.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        });
    if missing {
        return Err(format!(
            "Missing required metadata: {}",
            category.required_metadata().join(", ")
        ));
    }
    Ok(())
}
