//! Data models for anno
//!
//! Defines the core data structures: pages, transcription chunks, status
//! tags and annotations. The serde layout of these types is the on-disk
//! format of the `source/` and `annotation/` directories.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Well-known status names
pub mod status {
    pub const UNCHECKED: &str = "unchecked";
    pub const OK: &str = "ok";
    pub const OK2: &str = "ok2";
    pub const SKIP: &str = "skip";
    pub const DELETE: &str = "delete";
    /// Default annotation-level status
    pub const NORMAL: &str = "normal";
    /// Legacy annotation-level status, migrated to `normal` on load
    pub const IN_PROGRESS: &str = "in progress";
    /// Query pseudo-status: any chunk status other than empty or `unchecked`
    pub const CHECKED: &str = "checked";
    /// Query wildcard
    pub const ANY: &str = "any";
    /// Derived page status when chunk statuses disagree
    pub const UNKNOWN: &str = "unknown";
}

/// Accept JSON `null` where a collection or struct is expected
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Write an empty list as JSON `null`
fn empty_as_null<S, T>(items: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    if items.is_empty() {
        serializer.serialize_none()
    } else {
        items.serialize(serializer)
    }
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// A time interval in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A span is well formed when it has positive length
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// A time-bounded audio segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpan {
    /// Start time in milliseconds
    pub start: i64,
    /// End time in milliseconds
    pub end: i64,
    /// Page identifier, unique within a sub-project
    pub id: String,
    /// Audio file, relative to the sub-project's audio root
    pub audio: String,
}

impl PageSpan {
    pub fn new(id: impl Into<String>, audio: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            id: id.into(),
            audio: audio.into(),
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

impl fmt::Display for PageSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}-{}] {}", self.id, self.start, self.end, self.audio)
    }
}

/// A status value with the editor that set it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTag {
    pub name: String,
    pub source: String,
    pub timestamp: String,
}

impl StatusTag {
    /// Create a status tag stamped with the current time
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Create a status tag without a timestamp
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.source = self.source.trim().to_string();
    }
}

/// One editable unit of transcription within a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionChunk {
    pub uuid: String,
    /// Start relative to the page, in milliseconds
    pub start: i64,
    /// End relative to the page, in milliseconds
    pub end: i64,
    #[serde(rename = "trans")]
    pub text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub current_status: StatusTag,
    #[serde(
        serialize_with = "empty_as_null",
        deserialize_with = "null_as_default"
    )]
    pub status_history: Vec<StatusTag>,
}

impl TranscriptionChunk {
    /// Create an unchecked chunk with a fresh uuid
    pub fn new(start: i64, end: i64, text: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            start,
            end,
            text: text.into(),
            current_status: StatusTag::named(status::UNCHECKED),
            status_history: Vec::new(),
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Replace the current status, pushing the previous one onto the history
    pub fn set_status(&mut self, status: StatusTag) {
        if !self.current_status.name.is_empty() || !self.current_status.source.is_empty() {
            let previous = std::mem::take(&mut self.current_status);
            self.status_history.push(previous);
        }
        self.current_status = status;
    }

    /// Whether the chunk has been reviewed by an editor
    pub fn is_checked(&self) -> bool {
        let name = self.current_status.name.as_str();
        !name.is_empty() && name != status::UNCHECKED
    }
}

/// The editable record attached to one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    #[serde(rename = "sub_proj")]
    pub sub_project: String,
    pub page: PageSpan,
    #[serde(
        serialize_with = "empty_as_null",
        deserialize_with = "null_as_default"
    )]
    pub chunks: Vec<TranscriptionChunk>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub labels: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub current_status: StatusTag,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub status_history: Vec<StatusTag>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// 1-based position in source order, set by page traversal only
    #[serde(skip_serializing_if = "is_zero")]
    pub index: i64,
}

impl Annotation {
    /// Create an empty annotation for a page
    pub fn for_page(page: PageSpan) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Page identifier this annotation belongs to
    pub fn id(&self) -> &str {
        &self.page.id
    }

    /// Trim status names, status sources and chunk texts, and replace
    /// no-break spaces in chunk texts with regular spaces
    pub fn normalize(&mut self) {
        self.current_status.normalize();
        for chunk in &mut self.chunks {
            chunk.current_status.normalize();
            chunk.text = chunk.text.trim().replace('\u{00A0}', " ");
        }
    }

    /// Page status derived from the annotation and chunk statuses
    ///
    /// - `delete`/`skip` if the page itself is marked so
    /// - the common chunk status when all chunks agree
    /// - `unchecked` if any chunk is unchecked
    /// - `skip` if any chunk is skipped
    /// - `unknown` otherwise
    pub fn derived_status(&self) -> String {
        let page_status = self.current_status.name.as_str();
        if page_status == status::SKIP || page_status == status::DELETE {
            return page_status.to_string();
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for chunk in &self.chunks {
            *counts.entry(chunk.current_status.name.trim()).or_default() += 1;
        }

        if counts.len() == 1 {
            if let Some(name) = counts.keys().next() {
                return (*name).to_string();
            }
        }
        if counts.contains_key(status::UNCHECKED) {
            return status::UNCHECKED.to_string();
        }
        if counts.contains_key(status::SKIP) {
            return status::SKIP.to_string();
        }
        status::UNKNOWN.to_string()
    }

    /// Editors that have checked at least one chunk
    pub fn editors(&self) -> BTreeSet<String> {
        self.chunks
            .iter()
            .filter(|c| c.current_status.name != status::UNCHECKED)
            .map(|c| c.current_status.source.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Non-empty status sources on the page and its chunks
    pub fn status_sources(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.current_status.source.as_str())
            .chain(self.chunks.iter().map(|c| c.current_status.source.as_str()))
            .filter(|s| !s.is_empty())
    }

    /// Copy suitable for writing to disk (derived fields cleared)
    pub fn to_persisted(&self) -> Self {
        Self {
            index: 0,
            ..self.clone()
        }
    }
}

/// Identity of a connected client, used as the lock-holder token
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId {
    /// Connection identifier
    pub id: String,
    pub user_name: String,
}

impl ClientId {
    pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_name: user_name.into(),
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user_name, self.id)
    }
}
