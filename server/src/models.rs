use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    En,
}

impl Locale {
    pub fn parse(s: &str) -> Option<Locale> {
        match s {
            "ru" => Some(Locale::Ru),
            "en" => Some(Locale::En),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        }
    }
}

/// The four collections of the catalog, matching the `type` query/body
/// parameter of the media API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Music,
    Video,
    Photos,
    Publications,
}

impl MediaKind {
    pub fn parse(s: &str) -> Option<MediaKind> {
        match s {
            "music" => Some(MediaKind::Music),
            "video" => Some(MediaKind::Video),
            "photos" => Some(MediaKind::Photos),
            "publications" => Some(MediaKind::Publications),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Music => "music",
            MediaKind::Video => "video",
            MediaKind::Photos => "photos",
            MediaKind::Publications => "publications",
        }
    }
}

// year is a string in some seed records and a number in others; both forms
// must round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    pub composer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Year>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    pub duration: String,
    pub thumbnail: String,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Year>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performers: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    pub src: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Year>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    // derived-quality URLs (/photos/<size>/<same filename>), present only
    // when something has populated them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Year>,
    pub pages: i64,
    pub size: String,
    pub file_url: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

/// One record of the catalog, tagged by the collection it belongs to.
/// Constructed through [`MediaItem::from_value`] so the variant always
/// agrees with the target collection.
#[derive(Debug, Clone)]
pub enum MediaItem {
    Track(AudioTrack),
    Video(VideoItem),
    Photo(PhotoItem),
    Publication(PublicationItem),
}

impl MediaItem {
    pub fn from_value(kind: MediaKind, value: Value) -> Result<MediaItem, serde_json::Error> {
        Ok(match kind {
            MediaKind::Music => MediaItem::Track(serde_json::from_value(value)?),
            MediaKind::Video => MediaItem::Video(serde_json::from_value(value)?),
            MediaKind::Photos => MediaItem::Photo(serde_json::from_value(value)?),
            MediaKind::Publications => MediaItem::Publication(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            MediaItem::Track(t) => serde_json::to_value(t),
            MediaItem::Video(v) => serde_json::to_value(v),
            MediaItem::Photo(p) => serde_json::to_value(p),
            MediaItem::Publication(p) => serde_json::to_value(p),
        }
        .unwrap_or(Value::Null)
    }

    pub fn id(&self) -> &str {
        match self {
            MediaItem::Track(t) => &t.id,
            MediaItem::Video(v) => &v.id,
            MediaItem::Photo(p) => &p.id,
            MediaItem::Publication(p) => &p.id,
        }
    }

    /// Assign a unix-millis id when the caller did not supply one.
    pub fn ensure_id(&mut self) {
        if self.id().is_empty() {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_millis());
            let id = millis.to_string();
            match self {
                MediaItem::Track(t) => t.id = id,
                MediaItem::Video(v) => v.id = id,
                MediaItem::Photo(p) => p.id = id,
                MediaItem::Publication(p) => p.id = id,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicSection {
    pub tracks: Vec<AudioTrack>,
    pub list_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSection {
    pub items: Vec<VideoItem>,
    pub watch_video: String,
    pub source_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSection {
    pub items: Vec<PhotoItem>,
    pub source_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationSection {
    pub items: Vec<PublicationItem>,
    pub download_pdf: String,
    // UI label for the page count, persisted with the data like the other
    // section labels
    pub pages: String,
    pub source_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleCatalog {
    pub music: MusicSection,
    pub video: VideoSection,
    pub photos: PhotoSection,
    pub publications: PublicationSection,
}

impl LocaleCatalog {
    /// The whole collection container (items plus its UI-label strings),
    /// as returned by `GET /api/media?type=...`.
    pub fn section_value(&self, kind: MediaKind) -> Value {
        match kind {
            MediaKind::Music => serde_json::to_value(&self.music),
            MediaKind::Video => serde_json::to_value(&self.video),
            MediaKind::Photos => serde_json::to_value(&self.photos),
            MediaKind::Publications => serde_json::to_value(&self.publications),
        }
        .unwrap_or(Value::Null)
    }

    pub fn push(&mut self, item: MediaItem) {
        match item {
            MediaItem::Track(t) => self.music.tracks.push(t),
            MediaItem::Video(v) => self.video.items.push(v),
            MediaItem::Photo(p) => self.photos.items.push(p),
            MediaItem::Publication(p) => self.publications.items.push(p),
        }
    }

    /// Wholesale replace of the record with the same id. Returns false when
    /// no record matches.
    pub fn replace(&mut self, item: &MediaItem) -> bool {
        match item {
            MediaItem::Track(t) => replace_by_id(&mut self.music.tracks, &t.id, t.clone(), |x| &x.id),
            MediaItem::Video(v) => replace_by_id(&mut self.video.items, &v.id, v.clone(), |x| &x.id),
            MediaItem::Photo(p) => replace_by_id(&mut self.photos.items, &p.id, p.clone(), |x| &x.id),
            MediaItem::Publication(p) => {
                replace_by_id(&mut self.publications.items, &p.id, p.clone(), |x| &x.id)
            }
        }
    }

    pub fn remove(&mut self, kind: MediaKind, id: &str) -> bool {
        match kind {
            MediaKind::Music => remove_by_id(&mut self.music.tracks, id, |x| &x.id),
            MediaKind::Video => remove_by_id(&mut self.video.items, id, |x| &x.id),
            MediaKind::Photos => remove_by_id(&mut self.photos.items, id, |x| &x.id),
            MediaKind::Publications => remove_by_id(&mut self.publications.items, id, |x| &x.id),
        }
    }
}

fn replace_by_id<T>(items: &mut [T], id: &str, replacement: T, key: impl Fn(&T) -> &str) -> bool {
    match items.iter().position(|x| key(x) == id) {
        Some(idx) => {
            items[idx] = replacement;
            true
        }
        None => false,
    }
}

fn remove_by_id<T>(items: &mut Vec<T>, id: &str, key: impl Fn(&T) -> &str) -> bool {
    match items.iter().position(|x| key(x) == id) {
        Some(idx) => {
            items.remove(idx);
            true
        }
        None => false,
    }
}

/// The entire catalog document, both locale trees. The two trees are
/// independently mutable arrays; nothing ties ids across locales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCatalog {
    pub ru: LocaleCatalog,
    pub en: LocaleCatalog,
}

impl MediaCatalog {
    pub fn locale(&self, locale: Locale) -> &LocaleCatalog {
        match locale {
            Locale::Ru => &self.ru,
            Locale::En => &self.en,
        }
    }

    pub fn locale_mut(&mut self, locale: Locale) -> &mut LocaleCatalog {
        match locale {
            Locale::Ru => &mut self.ru,
            Locale::En => &mut self.en,
        }
    }

    /// The built-in document served when no catalog file exists yet (or the
    /// file on disk cannot be parsed).
    pub fn default_document() -> MediaCatalog {
        serde_json::from_str(include_str!("default_media.json"))
            .unwrap_or_else(|e| panic!("built-in default catalog is invalid: {}", e))
    }
}
