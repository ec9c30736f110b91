use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub mod local;

/// Read access to a directory of templates or static resources.
/// Paths are always relative to the reader's root.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> Result<String>;
    async fn list_files(&self, extension: &str) -> Result<Vec<PathBuf>>;
}

// lexically resolve `relative` against `root`, refusing anything that climbs out of it.
// template names come from stored pages, so they are treated as untrusted.
pub fn verify_relative_path(root: &Path, relative: &Path) -> Result<PathBuf> {
    let mut depth: i32 = 0;
    let mut resolved = root.to_path_buf();

    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(anyhow!(
                        "Path {} escapes resource root {}",
                        relative.display(),
                        root.display()
                    ));
                }
                resolved.pop();
            }
            Component::Normal(part) => {
                depth += 1;
                resolved.push(part);
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!(
                    "Absolute path {} is not allowed",
                    relative.display()
                ));
            }
        }
    }

    if depth == 0 {
        return Err(anyhow!("Path {} does not name a file", relative.display()));
    }

    Ok(resolved)
}

// after symlinks are resolved, the target must still live under the canonical root
pub fn verify_canonical_path(canonical_root: &Path, canonical: &Path) -> Result<()> {
    if canonical.starts_with(canonical_root) {
        Ok(())
    } else {
        Err(anyhow!(
            "Path {} resolves outside resource root {}",
            canonical.display(),
            canonical_root.display()
        ))
    }
}
