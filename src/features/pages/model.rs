use crate::domain::{ContentHash, Page, PageContent, PageVersion, VersionEdit, VersionStatus};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Eq, PartialEq, Clone, Debug, Display)]
#[display("{}", id)]
pub struct DbPage {
    pub id: String,
    pub label: String,
    pub template: String,
    pub current_version_id: Option<String>,
}

#[derive(sqlx::FromRow, Eq, PartialEq, Clone, Debug, Display)]
#[display("{}", id)]
pub struct DbPageVersion {
    pub id: String,
    pub page_id: String,
    pub title: String,
    pub description: Option<String>,
    pub hash: String,
    pub status: String,
    pub updated_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Eq, PartialEq, Clone, Debug)]
pub struct DbPageContent {
    pub id: String,
    pub page_version_id: String,
    pub position: i64,
    pub markup: String,
    // JSON array
    pub assets: String,
}

impl From<&Page> for DbPage {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id.to_string(),
            label: page.label.clone(),
            template: page.template.clone(),
            current_version_id: page.current_version_id.map(|id| id.to_string()),
        }
    }
}

impl TryFrom<DbPage> for Page {
    type Error = anyhow::Error;

    fn try_from(db_page: DbPage) -> Result<Self> {
        let current_version_id = match db_page.current_version_id {
            Some(raw) => Some(parse_uuid(&raw, "current_version_id")?),
            None => None,
        };

        Ok(Page {
            id: parse_uuid(&db_page.id, "page id")?,
            label: db_page.label,
            template: db_page.template,
            current_version_id,
        })
    }
}

impl From<&PageVersion> for DbPageVersion {
    fn from(version: &PageVersion) -> Self {
        Self {
            id: version.id.to_string(),
            page_id: version.page_id.to_string(),
            title: version.title.clone(),
            description: version.description.clone(),
            hash: version.hash.to_string(),
            status: version.status.to_string(),
            updated_at: version.updated_at,
        }
    }
}

impl DbPageVersion {
    pub fn into_version(self, contents: Vec<DbPageContent>) -> Result<PageVersion> {
        let hash = ContentHash::parse(&self.hash)
            .ok_or_else(|| anyhow!("Stored hash '{}' of version {} is malformed", self.hash, self.id))?;
        let status = VersionStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("Unknown status '{}' on version {}", self.status, self.id))?;

        let contents = contents
            .into_iter()
            .map(PageContent::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(PageVersion {
            id: parse_uuid(&self.id, "page version id")?,
            page_id: parse_uuid(&self.page_id, "page id")?,
            title: self.title,
            description: self.description,
            contents,
            hash,
            status,
            updated_at: self.updated_at,
        })
    }
}

impl DbPageContent {
    pub fn from_content(version_id: Uuid, position: usize, content: &PageContent) -> Result<Self> {
        Ok(Self {
            id: content.id.to_string(),
            page_version_id: version_id.to_string(),
            position: i64::try_from(position)?,
            markup: content.markup.clone(),
            assets: serde_json::to_string(&content.assets)?,
        })
    }
}

impl TryFrom<DbPageContent> for PageContent {
    type Error = anyhow::Error;

    fn try_from(db_content: DbPageContent) -> Result<Self> {
        let assets: Vec<String> = serde_json::from_str(&db_content.assets)
            .with_context(|| format!("Malformed assets on content {}", db_content.id))?;

        Ok(PageContent {
            id: parse_uuid(&db_content.id, "content id")?,
            markup: db_content.markup,
            assets,
        })
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Stored {} '{}' is not a UUID", what, raw))
}

// --- HTTP payloads ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonPageContent {
    // omitted for blocks the editor has just placed
    #[serde(default)]
    pub id: Option<Uuid>,
    pub markup: String,
    #[serde(default)]
    pub assets: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JsonVersionEdit {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contents: Vec<JsonPageContent>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JsonPageVersion {
    pub id: Uuid,
    pub page_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub contents: Vec<JsonPageContent>,
    pub hash: String,
    pub status: VersionStatus,
    pub updated_at: String,
    pub preview_url: String,
}

impl From<JsonVersionEdit> for VersionEdit {
    fn from(edit: JsonVersionEdit) -> Self {
        VersionEdit {
            title: edit.title,
            description: edit.description,
            contents: edit
                .contents
                .into_iter()
                .map(|content| PageContent {
                    id: content.id.unwrap_or_else(Uuid::new_v4),
                    markup: content.markup,
                    assets: content.assets,
                })
                .collect(),
        }
    }
}

pub fn page_version_to_json(version: &PageVersion, format: &str) -> JsonPageVersion {
    JsonPageVersion {
        id: version.id,
        page_id: version.page_id,
        title: version.title.to_owned(),
        description: version.description.to_owned(),
        contents: version
            .contents
            .iter()
            .map(|content| JsonPageContent {
                id: Some(content.id),
                markup: content.markup.to_owned(),
                assets: content.assets.to_owned(),
            })
            .collect(),
        hash: version.hash.to_string(),
        status: version.status,
        updated_at: version.updated_at.format(format).to_string(),
        preview_url: format!("/pages/preview/{}", version.hash),
    }
}
