//! Scoped UTF-8 file access inside a materialized checkout.

use crate::error::{DeppyError, Result};
use crate::utils::PathValidator;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
}

impl WorkTree {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = PathValidator::validate_project_path(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a tree-relative path. Does not require the file to exist.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = PathValidator::validate_relative_path(relative)?;
        Ok(self.root.join(relative))
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn read_text(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        let path = PathValidator::validate_file_path(&path, &self.root)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            DeppyError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read '{relative}': {e}"),
            ))
        })
    }

    /// Like [`read_text`](Self::read_text) but maps a missing file to `None`.
    pub async fn read_optional(&self, relative: &str) -> Result<Option<String>> {
        if !self.exists(relative).await {
            return Ok(None);
        }
        self.read_text(relative).await.map(Some)
    }

    pub async fn write_text(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            PathValidator::validate_file_path(&path, &self.root)?;
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    /// Removes a file if present.
    pub async fn remove(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_and_writes_inside_root() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path()).unwrap();

        tree.write_text("frontend/package.json", "{}").await.unwrap();
        assert_eq!(tree.read_text("frontend/package.json").await.unwrap(), "{}");
        assert!(tree.exists("frontend/package.json").await);
        assert_eq!(tree.read_optional("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path()).unwrap();

        assert!(tree.read_text("../outside").await.is_err());
        assert!(tree.write_text("/tmp/evil", "x").await.is_err());
        assert!(!tree.exists("../outside").await);
    }
}
