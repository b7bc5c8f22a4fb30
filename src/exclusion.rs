use crate::storage::Settings;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A `name:version` pair the bot must never upgrade to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub name: String,
    pub version: String,
}

impl ExclusionEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

struct PatternEntry {
    name: Regex,
    version: Regex,
}

/// Frozen view of the exclusion lists taken at the start of a run.
///
/// Pattern entries are matched with an unanchored regex search on both
/// fields, so `jackson` also matches `jackson-bom`. Anchor the pattern
/// explicitly (`^jackson$`) to require a full match.
pub struct ExclusionStrategy {
    exact: Vec<ExclusionEntry>,
    patterns: Vec<PatternEntry>,
}

impl ExclusionStrategy {
    pub fn new(exact: Vec<ExclusionEntry>, patterns: &[ExclusionEntry]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|entry| match (Regex::new(&entry.name), Regex::new(&entry.version)) {
                (Ok(name), Ok(version)) => Some(PatternEntry { name, version }),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(
                        name = %entry.name,
                        version = %entry.version,
                        error = %e,
                        "Ignoring exclusion pattern that does not compile"
                    );
                    None
                }
            })
            .collect();

        Self { exact, patterns }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.excluded_dependencies.clone(),
            &settings.excluded_dependency_patterns,
        )
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self::new(Vec::new(), &[])
    }

    pub fn has_exclusions(&self) -> bool {
        !self.exact.is_empty() || !self.patterns.is_empty()
    }

    pub fn is_excluded(&self, name: &str, version: &str) -> bool {
        if self
            .exact
            .iter()
            .any(|entry| entry.name == name && entry.version == version)
        {
            return true;
        }

        self.patterns
            .iter()
            .any(|entry| entry.name.is_match(name) && entry.version.is_match(version))
    }
}

/// Parses a free-form list such as `dep:1.0, group:artifact:2.0` into entries.
///
/// Tokens are separated by whitespace or commas and split at their last colon.
pub fn parse_raw_list(raw: &str) -> Vec<ExclusionEntry> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            token
                .rsplit_once(':')
                .map(|(name, version)| ExclusionEntry::new(name, version))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, version: &str) -> ExclusionEntry {
        ExclusionEntry::new(name, version)
    }

    #[test]
    fn exact_entry_requires_both_fields() {
        let strategy = ExclusionStrategy::new(vec![entry("kotlin", "1.5.0")], &[]);
        assert!(strategy.is_excluded("kotlin", "1.5.0"));
        assert!(!strategy.is_excluded("kotlin", "1.5.1"));
        assert!(!strategy.is_excluded("kotlinx", "1.5.0"));
    }

    #[test]
    fn pattern_entry_requires_both_patterns() {
        let strategy = ExclusionStrategy::new(Vec::new(), &[entry("^spring", "^3\\.")]);
        assert!(strategy.is_excluded("springBoot", "3.0.1"));
        assert!(!strategy.is_excluded("springBoot", "2.7.9"));
        assert!(!strategy.is_excluded("hibernate", "3.0.0"));
    }

    #[test]
    fn patterns_match_unanchored() {
        let strategy = ExclusionStrategy::new(Vec::new(), &[entry("jackson", "rc")]);
        assert!(strategy.is_excluded("fasterxml-jackson-bom", "2.15.0-rc1"));

        let anchored = ExclusionStrategy::new(Vec::new(), &[entry("^jackson$", "rc")]);
        assert!(!anchored.is_excluded("fasterxml-jackson-bom", "2.15.0-rc1"));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let strategy = ExclusionStrategy::new(Vec::new(), &[entry("(", ".*")]);
        assert!(!strategy.has_exclusions());
        assert!(!strategy.is_excluded("(", "1.0"));
    }

    #[test]
    fn adding_then_removing_restores_baseline() {
        let mut settings = Settings::default();
        assert!(!ExclusionStrategy::from_settings(&settings).is_excluded("react", "18.0.0"));

        settings.exclude(vec![entry("react", "18.0.0")], false);
        assert!(ExclusionStrategy::from_settings(&settings).is_excluded("react", "18.0.0"));

        settings.include(&[entry("react", "18.0.0")], false);
        let strategy = ExclusionStrategy::from_settings(&settings);
        assert!(!strategy.is_excluded("react", "18.0.0"));
        assert!(!strategy.has_exclusions());
    }

    #[test]
    fn parses_single_dependency() {
        assert_eq!(parse_raw_list("dep:version"), vec![entry("dep", "version")]);
        assert_eq!(parse_raw_list("  dep:version  "), vec![entry("dep", "version")]);
    }

    #[test]
    fn parses_mixed_separators() {
        let expected = vec![
            entry("dep1", "version1"),
            entry("dep2", "version2"),
            entry("group3:dep3", "version3"),
        ];
        assert_eq!(
            parse_raw_list("dep1:version1  dep2:version2 group3:dep3:version3"),
            expected
        );
        assert_eq!(
            parse_raw_list("dep1:version1,  dep2:version2 , group3:dep3:version3"),
            expected
        );
    }

    #[test]
    fn ignores_tokens_without_version() {
        assert_eq!(parse_raw_list("lonely, dep:1.0"), vec![entry("dep", "1.0")]);
    }
}
