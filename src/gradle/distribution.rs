use crate::error::Result;
use crate::maven::repository::validate_repository_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const GRADLE_VERSIONS_URL: &str = "https://services.gradle.org/versions/all";

/// One entry of the Gradle distribution index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionRelease {
    pub version: String,
    /// `yyyyMMddHHmmss+ZZZZ`, e.g. `20230224094310+0000`
    pub build_time: Option<String>,
    pub snapshot: bool,
    pub nightly: bool,
    pub release_nightly: bool,
    pub rc_for: Option<String>,
    pub milestone_for: Option<String>,
}

impl DistributionRelease {
    /// Snapshots, nightlies, release candidates and milestones.
    pub fn is_prerelease(&self) -> bool {
        self.snapshot
            || self.nightly
            || self.release_nightly
            || self.rc_for.as_deref().is_some_and(|v| !v.is_empty())
            || self.milestone_for.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[async_trait]
pub trait DistributionClient: Send + Sync {
    async fn fetch_releases(&self) -> Result<Vec<DistributionRelease>>;
}

pub struct GradleServicesClient {
    client: Client,
    url: String,
}

impl GradleServicesClient {
    pub fn new(url: &str) -> Result<Self> {
        validate_repository_url(url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("deppy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DistributionClient for GradleServicesClient {
    async fn fetch_releases(&self) -> Result<Vec<DistributionRelease>> {
        tracing::debug!(url = %self.url, "Fetching Gradle distributions");
        let releases = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<DistributionRelease>>()
            .await?;
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_services_payload() {
        let json = r#"[
            {"version":"8.1-rc-1","buildTime":"20230321124617+0000","snapshot":false,"nightly":false,"releaseNightly":false,"activeRc":true,"rcFor":"8.1","milestoneFor":"","broken":false},
            {"version":"8.0.2","buildTime":"20230303164137+0000","snapshot":false,"nightly":false,"releaseNightly":false,"activeRc":false,"rcFor":"","milestoneFor":"","broken":false}
        ]"#;
        let releases: Vec<DistributionRelease> = serde_json::from_str(json).unwrap();
        assert_eq!(releases.len(), 2);
        assert!(releases[0].is_prerelease());
        assert!(!releases[1].is_prerelease());
        assert_eq!(releases[1].build_time.as_deref(), Some("20230303164137+0000"));
    }
}
