use crate::error::{DeppyError, Result};
use crate::process::CommandRunner;
use crate::scm::WorkingTree;
use crate::worktree::WorkTree;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shallow single-branch clone driven through the `git` CLI.
pub struct GitCheckout {
    runner: Arc<dyn CommandRunner>,
    clone_url: String,
    branch: String,
    directory: PathBuf,
}

impl GitCheckout {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        clone_url: impl Into<String>,
        branch: impl Into<String>,
        directory: impl AsRef<Path>,
    ) -> Result<Self> {
        let clone_url = clone_url.into();
        let branch = branch.into();
        Self::validate_argument(&clone_url, "clone url")?;
        Self::validate_argument(&branch, "branch")?;

        Ok(Self {
            runner,
            clone_url,
            branch,
            directory: directory.as_ref().to_path_buf(),
        })
    }

    /// Rejects values git would read as an option.
    fn validate_argument(value: &str, what: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(DeppyError::SourceControl(format!("Empty {what}")));
        }
        if value.starts_with('-') || value.contains(['\n', '\r', '\0']) {
            return Err(DeppyError::SourceControl(format!(
                "Refusing suspicious {what}: '{value}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkingTree for GitCheckout {
    async fn prepare(&self) -> Result<WorkTree> {
        if tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            tracing::info!(dir = %self.directory.display(), "Removing previous checkout");
            tokio::fs::remove_dir_all(&self.directory).await?;
        }
        let parent = self
            .directory
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let target = self.directory.to_string_lossy();
        tracing::info!(branch = %self.branch, dir = %target, "Cloning repository");
        self.runner
            .run(
                "git",
                &[
                    "clone",
                    "--depth",
                    "1",
                    "--single-branch",
                    "--branch",
                    self.branch.as_str(),
                    self.clone_url.as_str(),
                    &*target,
                ],
                parent,
            )
            .await?
            .ensure_success("git clone")
            .map_err(|e| DeppyError::SourceControl(e.to_string()))?;

        WorkTree::new(&self.directory)
    }

    async fn dirty_files(&self, tree: &WorkTree) -> Result<Vec<String>> {
        let output = self
            .runner
            .run(
                "git",
                &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
                tree.root(),
            )
            .await?
            .ensure_success("git status")
            .map_err(|e| DeppyError::SourceControl(e.to_string()))?;
        Ok(parse_porcelain(&output.stdout))
    }
}

/// Paths of added, modified and untracked files from `git status --porcelain -z`.
pub fn parse_porcelain(status: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut entries = status.split('\0').filter(|entry| !entry.is_empty());
    while let Some(entry) = entries.next() {
        let (Some(code), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        // Renames and copies are followed by their source path.
        if code.starts_with(['R', 'C']) {
            entries.next();
        }
        if code.contains('D') {
            continue;
        }
        files.push(path.to_string());
    }
    files
}
