use crate::error::Result;
use crate::maven::repository::{DEFAULT_MAVEN_CENTRAL, GOOGLE_MAVEN};
use crate::worktree::WorkTree;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Gradle repository configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub url: String,
    /// Regex patterns a group must match for this repository to be consulted
    pub group_filters: Vec<String>,
}

impl Repository {
    pub fn maven_central() -> Self {
        Self::unfiltered("Maven Central", DEFAULT_MAVEN_CENTRAL)
    }

    pub fn google_maven() -> Self {
        Self {
            name: "Google Maven".to_string(),
            url: GOOGLE_MAVEN.to_string(),
            group_filters: vec![
                ".*google.*".to_string(),
                ".*android.*".to_string(),
                ".*androidx.*".to_string(),
            ],
        }
    }

    fn unfiltered(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            group_filters: Vec::new(),
        }
    }

    fn custom(url: &str) -> Self {
        Self::unfiltered(&format!("Custom ({})", shorten_url(url)), url)
    }
}

/// Build scripts scanned for `repositories { ... }` declarations.
const SCRIPT_FILES: &[&str] = &[
    "settings.gradle.kts",
    "settings.gradle",
    "build.gradle.kts",
    "build.gradle",
];

/// Matches `maven { url = uri("...") }`, `maven("...")`, `maven { url '...' }`
/// and `maven { url = '...' }` in both Kotlin and Groovy DSL.
static CUSTOM_MAVEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"maven\s*(?:\(\s*["']([^"']+)["']\s*\)|\{\s*url\s*(?:=\s*)?(?:uri\s*\(\s*)?["']([^"']+)["'])"#,
    )
    .expect("custom maven repository regex is valid")
});

/// Discovers the Maven repositories a Gradle build resolves from.
pub struct GradleConfigParser;

impl GradleConfigParser {
    /// Reads the root build scripts of a working tree. Missing scripts are skipped.
    pub async fn discover(tree: &WorkTree) -> Result<Vec<Repository>> {
        let mut scripts = Vec::new();
        for file in SCRIPT_FILES {
            if let Some(content) = tree.read_optional(file).await? {
                scripts.push(content);
            }
        }

        let repositories = Self::from_scripts(scripts.iter().map(String::as_str));
        for repo in &repositories {
            tracing::debug!(name = %repo.name, url = %repo.url, "Discovered repository");
        }
        Ok(repositories)
    }

    /// Extracts repositories from script contents, falling back to Maven
    /// Central and Google Maven when nothing is declared.
    pub fn from_scripts<'a>(scripts: impl IntoIterator<Item = &'a str>) -> Vec<Repository> {
        let mut repositories = Vec::new();

        for content in scripts {
            if content.contains("mavenCentral()") {
                repositories.push(Repository::maven_central());
            }
            if content.contains("google()") {
                repositories.push(Repository::google_maven());
            }
            if content.contains("jcenter()") {
                repositories.push(Repository::unfiltered(
                    "JCenter (Deprecated)",
                    "https://jcenter.bintray.com",
                ));
            }

            for cap in CUSTOM_MAVEN.captures_iter(content) {
                if let Some(url) = cap.get(1).or_else(|| cap.get(2)) {
                    repositories.push(Repository::custom(url.as_str()));
                }
            }
        }

        if repositories.is_empty() {
            tracing::info!("No repositories found in Gradle config, using defaults");
            repositories = vec![Repository::maven_central(), Repository::google_maven()];
        }

        deduplicate_repositories(repositories)
    }
}

/// Remove duplicate repositories, comparing URLs without a trailing slash
fn deduplicate_repositories(repos: Vec<Repository>) -> Vec<Repository> {
    let mut seen_urls = HashSet::new();
    repos
        .into_iter()
        .filter_map(|repo| {
            let url = repo.url.trim_end_matches('/').to_string();
            seen_urls
                .insert(url.clone())
                .then_some(Repository { url, ..repo })
        })
        .collect()
}

fn shorten_url(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_kotlin_dsl() {
        let content = r#"
repositories {
    mavenCentral()
    google()
    maven { url = uri("https://jitpack.io") }
    maven("https://maven.pkg.jetbrains.space/public/p/compose/dev")
}
        "#;

        let repos = GradleConfigParser::from_scripts([content]);

        assert_eq!(repos.len(), 4);
        assert!(repos.iter().any(|r| r.url == DEFAULT_MAVEN_CENTRAL));
        assert!(repos.iter().any(|r| r.url == "https://jitpack.io"));
        assert!(repos.iter().any(|r| r.name == "Custom (maven.pkg.jetbrains.space)"));
    }

    #[test]
    fn test_extract_groovy_dsl() {
        let content = r#"
repositories {
    mavenCentral()
    maven { url 'https://jitpack.io' }
    maven { url = 'https://repo.spring.io/milestone' }
}
        "#;

        let repos = GradleConfigParser::from_scripts([content]);

        assert_eq!(repos.len(), 3);
        assert!(repos.iter().any(|r| r.url == "https://jitpack.io"));
        assert!(repos.iter().any(|r| r.url == "https://repo.spring.io/milestone"));
    }

    #[test]
    fn test_deduplicate_across_scripts() {
        let settings = "repositories { mavenCentral() }";
        let build = r#"repositories { mavenCentral(); maven("https://repo1.maven.org/maven2/") }"#;

        let repos = GradleConfigParser::from_scripts([settings, build]);
        assert_eq!(repos, vec![Repository::maven_central()]);
    }

    #[test]
    fn falls_back_to_defaults() {
        let repos = GradleConfigParser::from_scripts(["plugins { java }"]);
        assert_eq!(
            repos,
            vec![Repository::maven_central(), Repository::google_maven()]
        );
    }
}
