use crate::domain::ContentHash;
use chrono::NaiveDateTime;
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logical page. Its `current_version_id` points at the published version, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub label: String,
    pub template: String,
    pub current_version_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    #[display("draft")]
    Draft,
    #[display("published")]
    Published,
}

impl VersionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// One placed component instance. Owned by exactly one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub id: Uuid,
    pub markup: String,
    pub assets: Vec<String>,
}

impl PageContent {
    pub fn new(markup: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            markup: markup.into(),
            assets,
        }
    }
}

/// A snapshot of a page's editable state.
///
/// `hash` is only trustworthy when produced by [`PageVersion::rehash`] after the last
/// change to `contents`; every write path goes through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVersion {
    pub id: Uuid,
    pub page_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub contents: Vec<PageContent>,
    pub hash: ContentHash,
    pub status: VersionStatus,
    pub updated_at: NaiveDateTime,
}

impl PageVersion {
    pub fn draft(
        page_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        contents: Vec<PageContent>,
        updated_at: NaiveDateTime,
    ) -> Self {
        let hash = ContentHash::compute(&contents);
        Self {
            id: Uuid::new_v4(),
            page_id,
            title: title.into(),
            description,
            contents,
            hash,
            status: VersionStatus::Draft,
            updated_at,
        }
    }

    pub fn rehash(&mut self) {
        self.hash = ContentHash::compute(&self.contents);
    }

    pub fn has_current_hash(&self) -> bool {
        self.hash == ContentHash::compute(&self.contents)
    }

    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }

    pub fn apply(&mut self, edit: VersionEdit, updated_at: NaiveDateTime) {
        self.title = edit.title;
        self.description = edit.description;
        self.contents = edit.contents;
        self.updated_at = updated_at;
        self.rehash();
    }
}

/// The editor-side changes to a draft, applied as a whole on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEdit {
    pub title: String,
    pub description: Option<String>,
    pub contents: Vec<PageContent>,
}
