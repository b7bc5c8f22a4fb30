//! Frontend manifest updates delegated to an external upgrade tool.

pub mod proposer;

use crate::changes::{ChangeRecord, ChangeSet, MANIFEST_SECTION};
use crate::engine::UpdateEngine;
use crate::error::Result;
use crate::exclusion::ExclusionStrategy;
use crate::process::CommandRunner;
use crate::worktree::WorkTree;
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use proposer::{NcuProposer, UpdateProposer};

const DEPENDENCY_SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestOptions {
    /// Directory holding `package.json`, relative to the checkout root.
    pub directory: String,
    pub lockfile: String,
    /// Shell commands run after the manifest is final to refresh the lockfile.
    pub install_commands: Vec<String>,
    pub ncu_command: String,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            directory: "frontend".to_string(),
            lockfile: "package-lock.json".to_string(),
            install_commands: vec!["npm install --package-lock-only".to_string()],
            ncu_command: proposer::DEFAULT_NCU_COMMAND.to_string(),
        }
    }
}

impl ManifestOptions {
    fn manifest_path(&self) -> String {
        format!("{}/package.json", self.directory.trim_end_matches('/'))
    }

    fn lockfile_path(&self) -> String {
        format!("{}/{}", self.directory.trim_end_matches('/'), self.lockfile)
    }
}

pub struct ManifestUpdater {
    proposer: Arc<dyn UpdateProposer>,
    runner: Arc<dyn CommandRunner>,
    options: ManifestOptions,
}

impl ManifestUpdater {
    pub fn new(
        proposer: Arc<dyn UpdateProposer>,
        runner: Arc<dyn CommandRunner>,
        options: ManifestOptions,
    ) -> Self {
        Self {
            proposer,
            runner,
            options,
        }
    }

    async fn apply(
        &self,
        tree: &WorkTree,
        manifest_before: &str,
        lock_before: Option<&str>,
        exclusions: &ExclusionStrategy,
    ) -> Result<ChangeSet> {
        let manifest_path = self.options.manifest_path();
        let previous = if exclusions.has_exclusions() {
            declared_versions(manifest_before)?
        } else {
            HashMap::new()
        };

        let directory = tree.resolve(&self.options.directory)?;
        let proposals = self.proposer.propose(&directory).await?;
        tracing::info!(proposals = proposals.len(), "Upgrade tool finished");

        let mut manifest = tree.read_text(&manifest_path).await?;
        let mut reverted = false;
        let mut changes = ChangeSet::new();
        for (name, version) in &proposals {
            if !exclusions.is_excluded(name, version) {
                changes.push(ChangeRecord::new(
                    MANIFEST_SECTION,
                    format!("`{name}` updated to `{version}`"),
                ));
                continue;
            }
            match previous.get(name) {
                Some(kept) => {
                    tracing::info!(name, version, kept, "Update is excluded, reverting");
                    manifest = revert_version(&manifest, name, version, kept);
                    reverted = true;
                }
                None => {
                    tracing::warn!(name, version, "Excluded update has no previous declaration to restore");
                }
            }
        }
        if reverted {
            tree.write_text(&manifest_path, &manifest).await?;
        }

        for command in &self.options.install_commands {
            tracing::info!(command, "Refreshing lockfile");
            let output = self
                .runner
                .run_shell(command, &directory)
                .await?
                .ensure_success(command)?;
            tracing::debug!(command, stdout = %output.stdout, stderr = %output.stderr, "Lockfile command output");
        }

        if changes.is_empty() {
            let lock_after = tree.read_optional(&self.options.lockfile_path()).await?;
            if lock_after.as_deref() != lock_before {
                tracing::info!("Lockfile changed without manifest updates");
                changes.push(ChangeRecord::new(MANIFEST_SECTION, "Updated peer dependencies"));
            }
        }

        Ok(changes)
    }

    async fn restore(&self, tree: &WorkTree, manifest: &str, lockfile: Option<&str>) -> Result<()> {
        tree.write_text(&self.options.manifest_path(), manifest).await?;
        let lockfile_path = self.options.lockfile_path();
        match lockfile {
            Some(content) => tree.write_text(&lockfile_path, content).await,
            None => tree.remove(&lockfile_path).await,
        }
    }
}

#[async_trait]
impl UpdateEngine for ManifestUpdater {
    fn name(&self) -> &'static str {
        "npm-manifest"
    }

    async fn update(&self, tree: &WorkTree, exclusions: &ExclusionStrategy) -> Result<ChangeSet> {
        let manifest_path = self.options.manifest_path();
        let Some(manifest_before) = tree.read_optional(&manifest_path).await? else {
            tracing::info!(manifest = %manifest_path, "No package manifest, skipping");
            return Ok(ChangeSet::new());
        };
        let lock_before = tree.read_optional(&self.options.lockfile_path()).await?;

        match self
            .apply(tree, &manifest_before, lock_before.as_deref(), exclusions)
            .await
        {
            Ok(changes) => Ok(changes),
            Err(e) => {
                tracing::error!(error = %e, "Frontend update failed, restoring manifest and lockfile");
                self.restore(tree, &manifest_before, lock_before.as_deref())
                    .await?;
                Ok(ChangeSet::new())
            }
        }
    }
}

/// Declared version specs by package name; earlier sections win.
fn declared_versions(manifest: &str) -> Result<HashMap<String, String>> {
    let manifest: Value = serde_json::from_str(manifest)?;
    let mut versions = HashMap::new();
    for section in DEPENDENCY_SECTIONS {
        let Some(entries) = manifest.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (name, spec) in entries {
            if let Some(spec) = spec.as_str() {
                versions
                    .entry(name.clone())
                    .or_insert_with(|| spec.to_string());
            }
        }
    }
    Ok(versions)
}

/// Replaces every `"name": "new"` declaration with `"name": "kept"`.
fn revert_version(manifest: &str, name: &str, new_version: &str, kept: &str) -> String {
    let pattern = format!(
        r#"("{}"\s*:\s*)"{}""#,
        regex::escape(name),
        regex::escape(new_version)
    );
    match Regex::new(&pattern) {
        Ok(declaration) => declaration
            .replace_all(manifest, |caps: &Captures| format!("{}\"{kept}\"", &caps[1]))
            .into_owned(),
        Err(e) => {
            tracing::warn!(name, error = %e, "Could not build reversion pattern");
            manifest.to_string()
        }
    }
}
