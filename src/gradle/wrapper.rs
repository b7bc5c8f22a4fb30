use crate::changes::{ChangeRecord, ChangeSet, WRAPPER_SECTION};
use crate::engine::UpdateEngine;
use crate::error::Result;
use crate::exclusion::ExclusionStrategy;
use crate::gradle::distribution::{DistributionClient, DistributionRelease};
use crate::worktree::WorkTree;
use async_trait::async_trait;
use jiff::Timestamp;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

/// Exclusion name the wrapper's versions are checked against.
pub const WRAPPER_EXCLUSION_NAME: &str = "gradle";

static DISTRIBUTION_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"distributionUrl\s*=\s*\S*-((?:\d|\.)+)-(?:bin|all)\.zip")
        .expect("distribution url regex is valid")
});

/// Keeps `gradle-wrapper.properties` on the newest final Gradle release.
pub struct WrapperUpdater {
    client: Arc<dyn DistributionClient>,
    properties_path: String,
}

impl WrapperUpdater {
    pub fn new(client: Arc<dyn DistributionClient>, properties_path: impl Into<String>) -> Self {
        Self {
            client,
            properties_path: properties_path.into(),
        }
    }

    /// Computes the rewritten properties text, or `None` when no update applies.
    pub async fn resolve(
        &self,
        content: &str,
        exclusions: &ExclusionStrategy,
    ) -> Result<Option<(String, ChangeRecord)>> {
        let Some(version) = DISTRIBUTION_URL
            .captures(content)
            .and_then(|caps| caps.get(1))
        else {
            tracing::warn!(path = %self.properties_path, "Could not find distributionUrl in wrapper properties");
            return Ok(None);
        };
        let current = version.as_str();
        tracing::info!(current, "Requesting available Gradle versions");

        let releases = self.client.fetch_releases().await?;
        let candidates = ordered_candidates(releases, exclusions);
        tracing::debug!(?candidates, "Acceptable Gradle versions");

        match candidates.iter().position(|v| v == current) {
            None => {
                tracing::warn!(current, "Current version is not among acceptable versions, cannot decide");
                Ok(None)
            }
            Some(0) => {
                tracing::info!(current, "Already on the latest acceptable version");
                Ok(None)
            }
            Some(_) => {
                let newest = &candidates[0];
                tracing::info!(current, newest = %newest, "Updating Gradle wrapper");

                let mut updated = String::with_capacity(content.len());
                updated.push_str(&content[..version.start()]);
                updated.push_str(newest);
                updated.push_str(&content[version.end()..]);

                let record = ChangeRecord::new(
                    WRAPPER_SECTION,
                    format!("Gradle updated from `{current}` to `{newest}`"),
                );
                Ok(Some((updated, record)))
            }
        }
    }
}

/// Final, non-excluded releases ordered by build time, newest first.
/// Releases without a parsable build time go last, in registry order.
fn ordered_candidates(
    releases: Vec<DistributionRelease>,
    exclusions: &ExclusionStrategy,
) -> Vec<String> {
    let mut candidates: Vec<(Option<Timestamp>, String)> = releases
        .into_iter()
        .filter(|release| !release.is_prerelease())
        .filter(|release| !exclusions.is_excluded(WRAPPER_EXCLUSION_NAME, &release.version))
        .map(|release| {
            let built = release.build_time.as_deref().and_then(parse_build_time);
            (built, release.version)
        })
        .collect();

    candidates.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    candidates.into_iter().map(|(_, version)| version).collect()
}

fn parse_build_time(raw: &str) -> Option<Timestamp> {
    Timestamp::strptime("%Y%m%d%H%M%S%z", raw).ok()
}

#[async_trait]
impl UpdateEngine for WrapperUpdater {
    fn name(&self) -> &'static str {
        "gradle-wrapper"
    }

    async fn update(&self, tree: &WorkTree, exclusions: &ExclusionStrategy) -> Result<ChangeSet> {
        let mut changes = ChangeSet::new();
        let Some(content) = tree.read_optional(&self.properties_path).await? else {
            tracing::info!(path = %self.properties_path, "No wrapper properties, skipping");
            return Ok(changes);
        };

        if let Some((updated, record)) = self.resolve(&content, exclusions).await? {
            tree.write_text(&self.properties_path, &updated).await?;
            changes.push(record);
        }
        Ok(changes)
    }
}
