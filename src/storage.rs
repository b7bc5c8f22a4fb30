//! Persistent bot state: exclusion lists and the integration branch baseline.

use crate::error::{DeppyError, Result};
use crate::exclusion::ExclusionEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub excluded_dependencies: Vec<ExclusionEntry>,
    pub excluded_dependency_patterns: Vec<ExclusionEntry>,
    pub updates_branch_head: Option<String>,
}

impl Settings {
    /// Appends entries not already present. Returns how many were added.
    pub fn exclude(&mut self, entries: Vec<ExclusionEntry>, pattern: bool) -> usize {
        let list = self.list_mut(pattern);
        let mut added = 0;
        for entry in entries {
            if !list.contains(&entry) {
                list.push(entry);
                added += 1;
            }
        }
        added
    }

    /// Removes matching entries. Returns how many were removed.
    pub fn include(&mut self, entries: &[ExclusionEntry], pattern: bool) -> usize {
        let list = self.list_mut(pattern);
        let before = list.len();
        list.retain(|existing| !entries.contains(existing));
        before - list.len()
    }

    fn list_mut(&mut self, pattern: bool) -> &mut Vec<ExclusionEntry> {
        if pattern {
            &mut self.excluded_dependency_patterns
        } else {
            &mut self.excluded_dependencies
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn settings(&self) -> Result<Settings>;

    async fn exclude(&self, entries: Vec<ExclusionEntry>, pattern: bool) -> Result<usize>;

    async fn include(&self, entries: &[ExclusionEntry], pattern: bool) -> Result<usize>;

    async fn branch_head(&self) -> Result<Option<String>> {
        Ok(self.settings().await?.updates_branch_head)
    }

    async fn set_branch_head(&self, commit: &str) -> Result<()>;
}

/// Settings persisted as a single JSON document.
///
/// The file is shared with other `deppy` processes, so every read goes to
/// disk and every mutation is a read-modify-write of the current file,
/// replaced through a temporary sibling and a rename.
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Settings::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                DeppyError::Storage(format!(
                    "Failed to parse settings file '{}': {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file yet, starting empty");
                Ok(Settings::default())
            }
            Err(e) => Err(DeppyError::Storage(format!(
                "Failed to read settings file '{}': {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }

    async fn update<T>(&self, mutate: impl FnOnce(&mut Settings) -> T) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await?;
        let result = mutate(&mut settings);
        self.save(&settings).await?;
        Ok(result)
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn settings(&self) -> Result<Settings> {
        self.load().await
    }

    async fn exclude(&self, entries: Vec<ExclusionEntry>, pattern: bool) -> Result<usize> {
        self.update(|settings| settings.exclude(entries, pattern))
            .await
    }

    async fn include(&self, entries: &[ExclusionEntry], pattern: bool) -> Result<usize> {
        self.update(|settings| settings.include(entries, pattern))
            .await
    }

    async fn set_branch_head(&self, commit: &str) -> Result<()> {
        self.update(|settings| settings.updates_branch_head = Some(commit.to_string()))
            .await
    }
}
