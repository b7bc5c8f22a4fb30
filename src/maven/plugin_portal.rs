use crate::error::{DeppyError, Result};
use crate::maven::repository::{fetch_metadata_versions, validate_repository_url};
use crate::maven::version::newest_first;
use crate::repository::{Coordinate, RepositoryClient};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const GRADLE_PLUGIN_PORTAL: &str = "https://plugins.gradle.org/m2";

/// Gradle Plugin Portal client
pub struct PluginPortalClient {
    client: Client,
    portal_url: String,
}

impl PluginPortalClient {
    pub fn with_url(portal_url: &str) -> Result<Self> {
        validate_repository_url(portal_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("deppy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            portal_url: portal_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every published version of a Gradle plugin, newest first.
    ///
    /// Plugin IDs like "org.jetbrains.kotlin.jvm" are published as marker artifacts:
    /// - Group: org.jetbrains.kotlin.jvm
    /// - Artifact: org.jetbrains.kotlin.jvm.gradle.plugin
    pub async fn fetch_plugin_versions(&self, plugin_id: &str) -> Result<Vec<String>> {
        let artifact = marker_artifact(plugin_id);
        tracing::debug!(plugin_id, artifact = %artifact, "Fetching plugin versions");

        let versions =
            fetch_metadata_versions(&self.client, &self.portal_url, plugin_id, &artifact).await?;

        match versions {
            Some(versions) => {
                tracing::debug!(plugin_id, count = versions.len(), "Found plugin versions");
                Ok(newest_first(versions))
            }
            None => {
                tracing::warn!(plugin_id, "Plugin is not published on the portal");
                Ok(Vec::new())
            }
        }
    }
}

fn marker_artifact(plugin_id: &str) -> String {
    format!("{plugin_id}.gradle.plugin")
}

#[async_trait]
impl RepositoryClient for PluginPortalClient {
    async fn fetch_available_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>> {
        match coordinate {
            Coordinate::Plugin { id } => self.fetch_plugin_versions(id).await,
            Coordinate::Dependency { group, artifact } => Err(DeppyError::Registry(format!(
                "Plugin portal does not resolve dependencies ({group}:{artifact})"
            ))),
        }
    }
}
