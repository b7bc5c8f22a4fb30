//! Remote source control and the local checkout the engines work in.

pub mod checkout;
pub mod github;

use crate::error::Result;
use crate::worktree::WorkTree;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use checkout::GitCheckout;
pub use github::GitHubClient;

pub const REGULAR_MODE: &str = "100644";
pub const EXECUTABLE_MODE: &str = "100755";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub head: String,
}

/// A blob to layer on top of a base tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl TreeEntry {
    /// Shell scripts keep their executable bit, everything else is a regular file.
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let mode = if path.ends_with(".sh") {
            EXECUTABLE_MODE
        } else {
            REGULAR_MODE
        };
        Self {
            path,
            mode: mode.to_string(),
            kind: "blob".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
}

/// Hosted repository operations needed to land a commit without pushing
/// from the local checkout.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn find_branch(&self, name: &str) -> Result<Option<BranchRef>>;

    /// Tree id of a commit.
    async fn commit_tree(&self, commit: &str) -> Result<String>;

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String>;

    /// Points `name` at `commit`, creating the branch or force-moving it.
    async fn upsert_branch(&self, name: &str, commit: &str) -> Result<()>;

    async fn find_open_pull_request(&self, head: &str, base: &str) -> Result<Option<PullRequest>>;

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest>;

    async fn update_pull_request_body(&self, number: u64, body: &str) -> Result<()>;
}

/// Provides a fresh checkout and reports what the engines changed in it.
#[async_trait]
pub trait WorkingTree: Send + Sync {
    async fn prepare(&self) -> Result<WorkTree>;

    /// Added and modified files relative to the tree root. Deletions are not reported.
    async fn dirty_files(&self, tree: &WorkTree) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_scripts_are_executable() {
        assert_eq!(TreeEntry::file("gradlew.sh", "#!/bin/sh").mode, EXECUTABLE_MODE);
        assert_eq!(TreeEntry::file("frontend/package.json", "{}").mode, REGULAR_MODE);
        assert_eq!(TreeEntry::file("gradlew", "").mode, REGULAR_MODE);
    }

    #[test]
    fn tree_entry_serializes_as_blob() {
        let json = serde_json::to_value(TreeEntry::file("a.txt", "x")).unwrap();
        assert_eq!(json["type"], "blob");
        assert_eq!(json["mode"], "100644");
    }
}
