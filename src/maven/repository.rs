use crate::error::{DeppyError, Result};
use crate::gradle::Repository as GradleRepository;
use crate::maven::version::newest_first;
use crate::repository::{Coordinate, RepositoryClient};
use async_trait::async_trait;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
pub const GOOGLE_MAVEN: &str = "https://dl.google.com/dl/android/maven2";
const MAX_METADATA_BYTES: usize = 10 * 1024 * 1024;

/// Maven repository client
pub struct MavenRepository {
    client: Client,
    repositories: Vec<GradleRepository>,
}

impl MavenRepository {
    pub fn new() -> Result<Self> {
        Self::with_repositories(Self::default_repositories())
    }

    pub fn with_repositories(repositories: Vec<GradleRepository>) -> Result<Self> {
        let client = Self::build_client()?;
        let repositories = if repositories.is_empty() {
            Self::default_repositories()
        } else {
            repositories
        };

        let repositories = Self::usable_repositories(repositories);

        Ok(Self {
            client,
            repositories,
        })
    }

    /// Fetch all available versions for a dependency, sorted from newest to oldest.
    ///
    /// Repositories are tried in declaration order; the first one that knows
    /// the artifact wins. Repositories whose group filters do not match are skipped.
    pub async fn fetch_versions(&self, group: &str, artifact: &str) -> Result<Vec<String>> {
        for repo in &self.repositories {
            if !repo.group_filters.is_empty() && !Self::matches_filters(group, &repo.group_filters)
            {
                continue;
            }

            match fetch_metadata_versions(&self.client, &repo.url, group, artifact).await {
                Ok(Some(versions)) if !versions.is_empty() => return Ok(newest_first(versions)),
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(repository = %repo.name, error = %e, "Metadata lookup failed");
                    continue;
                }
            }
        }

        tracing::warn!(group, artifact, "No repository returned versions");
        Ok(Vec::new())
    }

    /// Check if a group matches any of the regex filters
    fn matches_filters(group: &str, filters: &[String]) -> bool {
        filters
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .any(|re| re.is_match(group))
    }

    fn build_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("deppy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeppyError::from)
    }

    pub fn default_repositories() -> Vec<GradleRepository> {
        vec![
            GradleRepository::maven_central(),
            GradleRepository::google_maven(),
        ]
    }

    /// Drops repositories that cannot be queried over public http(s), such as
    /// `file:` or `$rootDir` paths, falling back to the defaults if none remain.
    fn usable_repositories(repositories: Vec<GradleRepository>) -> Vec<GradleRepository> {
        let usable: Vec<GradleRepository> = repositories
            .into_iter()
            .filter(|repo| match validate_repository_url(&repo.url) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(repository = %repo.name, url = %repo.url, error = %e, "Skipping repository");
                    false
                }
            })
            .collect();

        if usable.is_empty() {
            tracing::info!("No usable repositories declared, using defaults");
            return Self::default_repositories();
        }
        usable
    }
}

#[async_trait]
impl RepositoryClient for MavenRepository {
    async fn fetch_available_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>> {
        match coordinate {
            Coordinate::Dependency { group, artifact } => self.fetch_versions(group, artifact).await,
            Coordinate::Plugin { id } => Err(DeppyError::Registry(format!(
                "Maven repositories do not resolve plugin ids ({id})"
            ))),
        }
    }
}

/// Downloads `maven-metadata.xml` for an artifact. `Ok(None)` means the
/// repository does not host it.
pub(crate) async fn fetch_metadata_versions(
    client: &Client,
    repo_url: &str,
    group: &str,
    artifact: &str,
) -> Result<Option<Vec<String>>> {
    let group_path = group.replace('.', "/");
    let metadata_url = format!(
        "{}/{}/{}/maven-metadata.xml",
        repo_url.trim_end_matches('/'),
        group_path,
        artifact
    );

    tracing::debug!(url = %metadata_url, "Fetching metadata");

    let response = client.get(&metadata_url).send().await?;
    if !response.status().is_success() {
        tracing::debug!(status = %response.status(), url = %metadata_url, "Metadata not available");
        return Ok(None);
    }

    let text = response.text().await?;
    if text.len() > MAX_METADATA_BYTES {
        return Err(DeppyError::Registry(
            "Maven metadata response exceeded 10MB limit".to_string(),
        ));
    }

    let metadata: MavenMetadata = from_str(&text)
        .map_err(|e| DeppyError::Registry(format!("Failed to parse Maven metadata: {e}")))?;

    Ok(Some(metadata.versioning.versions.version))
}

/// Accepts only public http(s) repository URLs.
pub fn validate_repository_url(url: &str) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|_| DeppyError::Config(format!("Invalid repository URL: {url}")))?;

    match parsed.scheme() {
        "https" | "http" => {}
        scheme => {
            return Err(DeppyError::Config(format!(
                "Unsupported repository scheme: {scheme}"
            )));
        }
    }

    if let Some(host) = parsed.host_str() {
        if is_private_host(host) {
            return Err(DeppyError::Config(format!(
                "Repository host '{host}' is not allowed"
            )));
        }
    }

    Ok(())
}

fn is_private_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    match host.trim_matches(['[', ']']).parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback(),
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || v6.is_unique_local(),
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: Versioning,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Default, Deserialize)]
struct Versions {
    #[serde(default)]
    version: Vec<String>,
}

/// Parse a Maven coordinate (e.g., "com.example:artifact:1.0.0")
pub fn parse_maven_coordinate(coordinate: &str) -> Option<(String, String, Option<String>)> {
    let parts: Vec<&str> = coordinate.split(':').collect();
    match parts.len() {
        2 => Some((parts[0].to_string(), parts[1].to_string(), None)),
        3 => Some((
            parts[0].to_string(),
            parts[1].to_string(),
            Some(parts[2].to_string()),
        )),
        _ => None,
    }
}
