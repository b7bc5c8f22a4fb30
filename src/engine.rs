use crate::changes::ChangeSet;
use crate::error::Result;
use crate::exclusion::ExclusionStrategy;
use crate::worktree::WorkTree;
use async_trait::async_trait;

/// One independent source of updates run against the working tree.
#[async_trait]
pub trait UpdateEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn update(&self, tree: &WorkTree, exclusions: &ExclusionStrategy) -> Result<ChangeSet>;

    /// Runs [`update`](Self::update), isolating failures: an error is logged
    /// and reported as "no update" so sibling engines still run.
    async fn run(&self, tree: &WorkTree, exclusions: &ExclusionStrategy) -> ChangeSet {
        tracing::info!(engine = self.name(), "Checking for updates");
        match self.update(tree, exclusions).await {
            Ok(changes) => {
                tracing::info!(engine = self.name(), updates = changes.len(), "Check finished");
                changes
            }
            Err(e) => {
                tracing::error!(engine = self.name(), error = %e, "Update check failed");
                ChangeSet::new()
            }
        }
    }
}
