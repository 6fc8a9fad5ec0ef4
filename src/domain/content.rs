//! Content records and their identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Principal;

/// Sequential content identifier (starts at 1, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(u64);

impl ContentId {
    /// The first id handed out by a fresh store
    pub const FIRST: ContentId = ContentId(1);

    /// Wrap a raw id. Zero is not a valid id.
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Get the raw integer value
    pub fn get(self) -> u64 {
        self.0
    }

    /// The id allocated after this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid content id: {}", s))?;
        Self::new(raw).ok_or_else(|| format!("Content id must be positive: {}", s))
    }
}

/// Category of a content item.
///
/// The built-in variants cover the common media kinds. Anything else parses
/// into `Extension` and is only accepted when the active
/// [`Vocabulary`](crate::core::Vocabulary) registers that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ContentType {
    /// Live or recorded performance
    Performance,

    /// Video
    Video,

    /// Audio
    Audio,

    /// Written text
    Text,

    /// A deployment-specific category
    Extension(String),
}

impl ContentType {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Performance => "performance",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Text => "text",
            ContentType::Extension(name) => name,
        }
    }

    /// Whether this is one of the built-in variants
    pub fn is_builtin(&self) -> bool {
        !matches!(self, ContentType::Extension(_))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ContentType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "performance" => ContentType::Performance,
            "video" => ContentType::Video,
            "audio" => ContentType::Audio,
            "text" => ContentType::Text,
            other => ContentType::Extension(other.to_string()),
        }
    }
}

impl From<&str> for ContentType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ContentType> for String {
    fn from(t: ContentType) -> Self {
        t.as_str().to_string()
    }
}

/// Largest duration every backend can store (SQLite integers are signed)
pub const MAX_DURATION: u64 = i64::MAX as u64;

/// Caller-supplied fields for a new content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    pub description: String,
    pub content_hash: String,
    pub content_type: ContentType,
    pub duration: u64,
}

impl NewContent {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        content_hash: impl Into<String>,
        content_type: impl Into<ContentType>,
        duration: u64,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            content_hash: content_hash.into(),
            content_type: content_type.into(),
            duration,
        }
    }
}

/// A registered content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Content identifier
    pub content_id: ContentId,

    /// Principal that created the record (never changes)
    pub creator: Principal,

    /// Human-readable title
    pub title: String,

    /// Free-text description
    pub description: String,

    /// Opaque content-addressing token
    pub content_hash: String,

    /// When the record was created
    pub creation_timestamp: DateTime<Utc>,

    /// Category of content
    pub content_type: ContentType,

    /// Length of the content, unit-agnostic
    pub duration: u64,

    /// One-way publication latch
    #[serde(default)]
    pub is_published: bool,
}

impl ContentRecord {
    /// Build an unpublished record stamped with the current time
    pub fn new(content_id: ContentId, creator: Principal, input: NewContent) -> Self {
        Self {
            content_id,
            creator,
            title: input.title,
            description: input.description,
            content_hash: input.content_hash,
            creation_timestamp: Utc::now(),
            content_type: input.content_type,
            duration: input.duration,
            is_published: false,
        }
    }
}
