//! Version catalog resolution: keeps centrally declared version keys on the
//! newest acceptable release of the artifacts that cite them.
//!
//! A catalog set is one catalog file plus the descriptor files whose
//! artifacts reference the catalog's keys. For every key, references are
//! consulted in discovery order until one registry knows the artifact; that
//! artifact's newest-first version list then decides the key alone.

pub mod model;
pub mod syntax;

use crate::changes::{CATALOG_SECTION, ChangeRecord, ChangeSet};
use crate::engine::UpdateEngine;
use crate::error::Result;
use crate::exclusion::ExclusionStrategy;
use crate::repository::{Coordinate, RepositoryClient};
use crate::worktree::WorkTree;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use model::{ReferenceIndex, VersionDefinition};
use syntax::syntax_for;

pub const DEFAULT_CATALOG: &str = "gradle/libs.versions.toml";
pub const DEFAULT_REGISTRY_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSet {
    pub catalog: String,
    /// Files scanned for references. A TOML catalog usually lists itself.
    #[serde(default)]
    pub descriptors: Vec<String>,
}

impl CatalogSet {
    pub fn new(catalog: impl Into<String>, descriptors: Vec<String>) -> Self {
        Self {
            catalog: catalog.into(),
            descriptors,
        }
    }

    /// The stock Gradle version catalog, which cites its own keys.
    pub fn gradle_default() -> Self {
        Self::new(DEFAULT_CATALOG, vec![DEFAULT_CATALOG.to_string()])
    }
}

/// Outcome of resolving a single version key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Undecided,
    Current,
    Upgrade(String),
    Exhausted,
}

pub struct CatalogUpdater {
    libraries: Arc<dyn RepositoryClient>,
    plugins: Arc<dyn RepositoryClient>,
    sets: Vec<CatalogSet>,
    concurrency: usize,
}

impl CatalogUpdater {
    pub fn new(
        libraries: Arc<dyn RepositoryClient>,
        plugins: Arc<dyn RepositoryClient>,
        sets: Vec<CatalogSet>,
    ) -> Self {
        Self {
            libraries,
            plugins,
            sets,
            concurrency: DEFAULT_REGISTRY_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Computes the rewritten catalog text for one set along with its records.
    pub async fn resolve_set(
        &self,
        tree: &WorkTree,
        set: &CatalogSet,
        original: String,
        exclusions: &ExclusionStrategy,
    ) -> Result<(String, Vec<ChangeRecord>)> {
        let definitions = syntax_for(&set.catalog).version_definitions(&original)?;
        let index = self.index_references(tree, set, &original).await?;
        tracing::debug!(
            catalog = %set.catalog,
            definitions = definitions.len(),
            keys = index.keys().count(),
            "Parsed catalog set"
        );

        let lookups: Vec<_> = definitions
            .iter()
            .map(|definition| self.decide(definition, index.references(&definition.key), exclusions))
            .collect();
        let decisions: Vec<Decision> = stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await;

        let upgrades: Vec<(&VersionDefinition, String)> = definitions
            .iter()
            .zip(decisions)
            .filter_map(|(definition, decision)| match decision {
                Decision::Upgrade(new_version) => Some((definition, new_version)),
                _ => None,
            })
            .collect();

        // Spans refer to the original text, so splice from the end backwards.
        let mut content = original;
        let mut applied: Vec<bool> = upgrades
            .iter()
            .rev()
            .map(|(definition, new_version)| replace_declaration(&mut content, definition, new_version))
            .collect();
        applied.reverse();

        let records = upgrades
            .iter()
            .zip(applied)
            .filter(|(_, applied)| *applied)
            .map(|((definition, new_version), _)| {
                ChangeRecord::new(
                    CATALOG_SECTION,
                    format!(
                        "Updated `{}` from `{}` to `{}`",
                        definition.key, definition.current_value, new_version
                    ),
                )
            })
            .collect();
        Ok((content, records))
    }

    async fn index_references(
        &self,
        tree: &WorkTree,
        set: &CatalogSet,
        catalog_text: &str,
    ) -> Result<ReferenceIndex> {
        let mut index = ReferenceIndex::new();
        for descriptor in &set.descriptors {
            let text = if descriptor == &set.catalog {
                catalog_text.to_string()
            } else {
                match tree.read_optional(descriptor).await? {
                    Some(text) => text,
                    None => {
                        tracing::warn!(descriptor = %descriptor, "Descriptor not found, skipping");
                        continue;
                    }
                }
            };
            index.extend(syntax_for(descriptor).artifact_references(&text)?);
        }
        Ok(index)
    }

    async fn decide(
        &self,
        definition: &VersionDefinition,
        references: &[Coordinate],
        exclusions: &ExclusionStrategy,
    ) -> Decision {
        for coordinate in references {
            let candidates = self.candidates(coordinate).await;
            if candidates.is_empty() {
                tracing::debug!(key = %definition.key, %coordinate, "No versions known, trying next reference");
                continue;
            }
            return walk_candidates(definition, &candidates, exclusions);
        }
        if references.is_empty() {
            tracing::debug!(key = %definition.key, "Version key is not referenced");
        }
        Decision::Undecided
    }

    async fn candidates(&self, coordinate: &Coordinate) -> Vec<String> {
        let client = if coordinate.is_plugin() {
            &self.plugins
        } else {
            &self.libraries
        };
        match client.fetch_available_versions(coordinate).await {
            Ok(versions) => versions,
            Err(e) => {
                tracing::warn!(%coordinate, error = %e, "Failed to fetch versions");
                Vec::new()
            }
        }
    }
}

/// Rewrites the value inside `definition`'s own declaration.
fn replace_declaration(
    content: &mut String,
    definition: &VersionDefinition,
    new_version: &str,
) -> bool {
    let span = definition.span();
    if content.get(span.clone()) != Some(definition.raw_text.as_str()) {
        tracing::warn!(key = %definition.key, "Declaration moved since parsing, not rewriting");
        return false;
    }
    content.replace_range(span, &definition.with_value(new_version));
    true
}

fn walk_candidates(
    definition: &VersionDefinition,
    candidates: &[String],
    exclusions: &ExclusionStrategy,
) -> Decision {
    let key = definition.key.as_str();
    for candidate in candidates {
        if candidate == &definition.current_value {
            tracing::info!(key, current = %candidate, "Already on the latest version");
            return Decision::Current;
        }
        if exclusions.is_excluded(key, candidate) {
            tracing::info!(key, version = %candidate, "Skipping excluded version");
            continue;
        }
        tracing::info!(key, from = %definition.current_value, to = %candidate, "Updating version");
        return Decision::Upgrade(candidate.clone());
    }
    tracing::info!(key, "Every newer version is excluded");
    Decision::Exhausted
}

#[async_trait]
impl UpdateEngine for CatalogUpdater {
    fn name(&self) -> &'static str {
        "version-catalog"
    }

    async fn update(&self, tree: &WorkTree, exclusions: &ExclusionStrategy) -> Result<ChangeSet> {
        let mut changes = ChangeSet::new();
        // Rewritten catalog texts, written once every set has been resolved.
        let mut pending: Vec<(String, String)> = Vec::new();

        for set in &self.sets {
            let staged = pending
                .iter()
                .find(|(path, _)| path == &set.catalog)
                .map(|(_, content)| content.clone());
            let original = match staged {
                Some(content) => content,
                None => match tree.read_optional(&set.catalog).await? {
                    Some(content) => content,
                    None => {
                        tracing::info!(catalog = %set.catalog, "Catalog not found, skipping");
                        continue;
                    }
                },
            };

            match self.resolve_set(tree, set, original, exclusions).await {
                Ok((content, records)) => {
                    if records.is_empty() {
                        continue;
                    }
                    match pending.iter_mut().find(|(path, _)| path == &set.catalog) {
                        Some((_, staged)) => *staged = content,
                        None => pending.push((set.catalog.clone(), content)),
                    }
                    for record in records {
                        changes.push(record);
                    }
                }
                Err(e) => {
                    tracing::error!(catalog = %set.catalog, error = %e, "Catalog set failed, skipping");
                }
            }
        }

        for (catalog, content) in &pending {
            tree.write_text(catalog, content).await?;
        }
        Ok(changes)
    }
}
