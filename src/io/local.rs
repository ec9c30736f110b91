use crate::io::{ResourceReader, verify_canonical_path, verify_relative_path};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct LocalResourceReader {
    pub root_path: PathBuf,
}

impl LocalResourceReader {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }
}

#[async_trait]
impl ResourceReader for LocalResourceReader {
    async fn read_to_string(&self, path: &Path) -> Result<String> {
        let verified = verify_relative_path(&self.root_path, path)?;

        let canonical_root = tokio::fs::canonicalize(&self.root_path)
            .await
            .with_context(|| format!("Resource root {} is missing", self.root_path.display()))?;
        let canonical = tokio::fs::canonicalize(&verified)
            .await
            .with_context(|| format!("Resource {} is missing", verified.display()))?;
        verify_canonical_path(&canonical_root, &canonical)?;

        tokio::fs::read_to_string(&canonical)
            .await
            .with_context(|| format!("Failed to read {}", canonical.display()))
    }

    async fn list_files(&self, extension: &str) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some(extension)
            {
                if let Ok(relative) = entry.path().strip_prefix(&self.root_path) {
                    entries.push(relative.to_path_buf());
                }
            }
        }
        Ok(entries)
    }
}
