//! Lands a working tree's changes on the integration branch and keeps its
//! pull request current, refusing to touch a branch someone else moved.

use crate::changes::ChangeSet;
use crate::error::{DeppyError, Result};
use crate::scm::{SourceControl, TreeEntry};
use crate::storage::Storage;
use crate::worktree::WorkTree;
use std::fmt;
use std::sync::Arc;

pub const PULL_REQUEST_TITLE: &str = "Dependencies update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NoChanges,
    Landed { commit: String },
    /// The integration branch is not where the bot last left it.
    Drift {
        expected: Option<String>,
        actual: String,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChanges => write!(f, "no updates found"),
            Self::Landed { commit } => write!(f, "updates landed as {commit}"),
            Self::Drift { expected, actual } => write!(
                f,
                "integration branch is at {actual} but expected {}",
                expected.as_deref().unwrap_or("nothing")
            ),
        }
    }
}

pub struct Reconciler {
    scm: Arc<dyn SourceControl>,
    storage: Arc<dyn Storage>,
    main_branch: String,
    integration_branch: String,
}

impl Reconciler {
    pub fn new(
        scm: Arc<dyn SourceControl>,
        storage: Arc<dyn Storage>,
        main_branch: impl Into<String>,
        integration_branch: impl Into<String>,
    ) -> Self {
        Self {
            scm,
            storage,
            main_branch: main_branch.into(),
            integration_branch: integration_branch.into(),
        }
    }

    /// `Some(Drift)` when the integration branch exists at a commit other
    /// than the persisted head. Performs no mutation.
    pub async fn check_drift(&self) -> Result<Option<RunOutcome>> {
        let Some(branch) = self.scm.find_branch(&self.integration_branch).await? else {
            return Ok(None);
        };
        let expected = self.storage.branch_head().await?;
        if expected.as_deref() == Some(branch.head.as_str()) {
            return Ok(None);
        }

        tracing::warn!(
            branch = %self.integration_branch,
            actual = %branch.head,
            expected = expected.as_deref().unwrap_or("<none>"),
            "Integration branch was changed outside the bot, stopping. Proceed with the branch on your own"
        );
        Ok(Some(RunOutcome::Drift {
            expected,
            actual: branch.head,
        }))
    }

    /// Commits `files` from `tree` on top of the main branch, moves the
    /// integration branch there and upserts the pull request.
    pub async fn land(
        &self,
        tree: &WorkTree,
        files: &[String],
        changes: &ChangeSet,
    ) -> Result<RunOutcome> {
        if changes.is_empty() {
            return Ok(RunOutcome::NoChanges);
        }
        if files.is_empty() {
            tracing::warn!(updates = changes.len(), "Updates were reported but no file changed");
            return Ok(RunOutcome::NoChanges);
        }
        tracing::info!(?files, "Committing modified files");

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            entries.push(TreeEntry::file(file, tree.read_text(file).await?));
        }

        let main = self.scm.find_branch(&self.main_branch).await?.ok_or_else(|| {
            DeppyError::SourceControl(format!("Main branch '{}' not found", self.main_branch))
        })?;
        let base_tree = self.scm.commit_tree(&main.head).await?;
        let new_tree = self.scm.create_tree(&base_tree, &entries).await?;
        tracing::debug!(base_tree = %base_tree, tree = %new_tree, "Created tree");

        let message = changes.describe();
        let commit = self
            .scm
            .create_commit(&message, &new_tree, std::slice::from_ref(&main.head))
            .await?;
        tracing::info!(commit = %commit, parent = %main.head, "Created commit");

        self.scm
            .upsert_branch(&self.integration_branch, &commit)
            .await?;
        self.storage.set_branch_head(&commit).await?;
        tracing::info!(branch = %self.integration_branch, commit = %commit, "Integration branch updated");

        self.upsert_pull_request(&message).await?;
        Ok(RunOutcome::Landed { commit })
    }

    async fn upsert_pull_request(&self, body: &str) -> Result<()> {
        match self
            .scm
            .find_open_pull_request(&self.integration_branch, &self.main_branch)
            .await?
        {
            Some(pull) => {
                tracing::info!(number = pull.number, "Updating pull request description");
                self.scm.update_pull_request_body(pull.number, body).await
            }
            None => {
                let pull = self
                    .scm
                    .create_pull_request(
                        PULL_REQUEST_TITLE,
                        &self.integration_branch,
                        &self.main_branch,
                        body,
                    )
                    .await?;
                tracing::info!(number = pull.number, "Opened pull request");
                Ok(())
            }
        }
    }
}
