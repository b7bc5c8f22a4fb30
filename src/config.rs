//! `deppy.toml` loading with environment overrides.

use crate::catalog::{CatalogSet, DEFAULT_REGISTRY_CONCURRENCY};
use crate::error::{DeppyError, Result};
use crate::gradle::distribution::GRADLE_VERSIONS_URL;
use crate::maven::plugin_portal::GRADLE_PLUGIN_PORTAL;
use crate::npm::ManifestOptions;
use crate::scm::github::GITHUB_API_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deppy.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `owner/name` of the hosted repository.
    pub repo: String,
    /// Defaults to the GitHub HTTPS url of `repo`.
    pub clone_url: Option<String>,
    pub main_branch: String,
    pub integration_branch: String,
    pub state_file: PathBuf,
    pub checkout_dir: PathBuf,
    pub github: GitHubConfig,
    pub schedule: ScheduleConfig,
    pub registries: RegistryConfig,
    pub wrapper: WrapperConfig,
    pub manifest: ManifestOptions,
    pub catalogs: Vec<CatalogSet>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    /// Usually supplied through `DEPPY_GITHUB_TOKEN` or `GITHUB_TOKEN`.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    pub push_debounce_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub plugin_portal: String,
    pub gradle_versions: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    pub properties: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: String::new(),
            clone_url: None,
            main_branch: "master".to_string(),
            integration_branch: "dependencies-update".to_string(),
            state_file: PathBuf::from("deppy-state.json"),
            checkout_dir: std::env::temp_dir().join("deppy-clone-directory"),
            github: GitHubConfig::default(),
            schedule: ScheduleConfig::default(),
            registries: RegistryConfig::default(),
            wrapper: WrapperConfig::default(),
            manifest: ManifestOptions::default(),
            catalogs: vec![CatalogSet::gradle_default()],
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_URL.to_string(),
            token: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
            push_debounce_secs: 60,
            poll_interval_secs: 60,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            plugin_portal: GRADLE_PLUGIN_PORTAL.to_string(),
            gradle_versions: GRADLE_VERSIONS_URL.to_string(),
            concurrency: DEFAULT_REGISTRY_CONCURRENCY,
        }
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            properties: "gradle/wrapper/gradle-wrapper.properties".to_string(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn push_debounce(&self) -> Duration {
        Duration::from_secs(self.push_debounce_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Loads `path`, or `deppy.toml` from the working directory when present,
    /// then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                tracing::debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeppyError::Config(format!(
                "Failed to read configuration '{}': {e}",
                path.display()
            ))
        })?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides values from the environment through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("DEPPY_GITHUB_TOKEN").or_else(|| non_empty("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(repo) = non_empty("DEPPY_REPO") {
            self.repo = repo;
        }
        if let Some(clone_url) = non_empty("DEPPY_CLONE_URL") {
            self.clone_url = Some(clone_url);
        }
        if let Some(state_file) = non_empty("DEPPY_STATE_FILE") {
            self.state_file = PathBuf::from(state_file);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.main_branch.trim().is_empty() || self.integration_branch.trim().is_empty() {
            return Err(DeppyError::Config("Branch names must not be empty".to_string()));
        }
        if self.main_branch == self.integration_branch {
            return Err(DeppyError::Config(format!(
                "Integration branch must differ from the main branch '{}'",
                self.main_branch
            )));
        }
        if self.registries.concurrency == 0 {
            return Err(DeppyError::Config(
                "registries.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Token for the source-control API, required by `run` and `serve`.
    pub fn require_token(&self) -> Result<&str> {
        self.github.token.as_deref().ok_or_else(|| {
            DeppyError::Config(
                "GitHub token missing: set DEPPY_GITHUB_TOKEN or GITHUB_TOKEN".to_string(),
            )
        })
    }

    pub fn require_repo(&self) -> Result<&str> {
        if self.repo.trim().is_empty() {
            return Err(DeppyError::Config(
                "Repository missing: set `repo` in deppy.toml or DEPPY_REPO".to_string(),
            ));
        }
        Ok(&self.repo)
    }

    pub fn clone_url(&self) -> Result<String> {
        match &self.clone_url {
            Some(url) => Ok(url.clone()),
            None => Ok(format!("https://github.com/{}.git", self.require_repo()?)),
        }
    }
}
