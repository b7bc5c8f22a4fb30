//! Surface syntaxes a version catalog can be written in.

use crate::catalog::model::{ArtifactReference, VersionDefinition};
use crate::error::{DeppyError, Result};
use crate::utils::TomlUtils;
use regex::Regex;
use std::sync::LazyLock;
use toml_edit::DocumentMut;

/// Extracts version definitions and artifact references from one file.
pub trait CatalogSyntax: Send + Sync {
    /// Definitions in file order. A key defined twice keeps its first definition.
    fn version_definitions(&self, text: &str) -> Result<Vec<VersionDefinition>>;

    /// References in file order, dependencies before plugins.
    fn artifact_references(&self, text: &str) -> Result<Vec<ArtifactReference>>;
}

/// Picks the syntax from the file extension: `.toml` is a Gradle version
/// catalog, anything else is read as Kotlin (`buildSrc` style).
pub fn syntax_for(path: &str) -> &'static dyn CatalogSyntax {
    static KOTLIN: KotlinDsl = KotlinDsl;
    static TOML: TomlCatalog = TomlCatalog;

    if path.ends_with(".toml") {
        return &TOML;
    }
    &KOTLIN
}

fn dedup_keys(definitions: Vec<VersionDefinition>) -> Vec<VersionDefinition> {
    let mut unique: Vec<VersionDefinition> = Vec::with_capacity(definitions.len());
    for definition in definitions {
        if unique.iter().any(|d| d.key == definition.key) {
            tracing::debug!(key = %definition.key, "Duplicate version definition, keeping the first");
            continue;
        }
        unique.push(definition);
    }
    unique
}

static KOTLIN_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bval\s+(\w+)\s*(?::\s*String\s*)?=\s*"([^"\n]*)""#)
        .expect("definition regex is valid")
});

static KOTLIN_DEPENDENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\s:$]+):([^"\s:$]+):\$\{Versions\.(\w+)\}""#)
        .expect("dependency regex is valid")
});

static KOTLIN_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bid\s*\(?\s*"([^"\s]+)"\s*\)?\s*version\s+Versions\.(\w+)"#)
        .expect("plugin regex is valid")
});

static KOTLIN_SHORTHAND_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bkotlin\s*\(\s*"([^"\s]+)"\s*\)\s*version\s+Versions\.(\w+)"#)
        .expect("kotlin plugin regex is valid")
});

/// `object Versions { val kotlin = "1.9.0" }` with references written as
/// `"group:artifact:${Versions.kotlin}"` and `id("plugin") version Versions.kotlin`.
pub struct KotlinDsl;

impl CatalogSyntax for KotlinDsl {
    fn version_definitions(&self, text: &str) -> Result<Vec<VersionDefinition>> {
        let definitions = KOTLIN_DEFINITION
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                Some(VersionDefinition::new(&caps[1], &caps[2], &caps[0]).at(start))
            })
            .collect();
        Ok(dedup_keys(definitions))
    }

    fn artifact_references(&self, text: &str) -> Result<Vec<ArtifactReference>> {
        let mut references: Vec<ArtifactReference> = KOTLIN_DEPENDENCY
            .captures_iter(text)
            .map(|caps| ArtifactReference::dependency(&caps[1], &caps[2], &caps[3]))
            .collect();

        let mut plugins: Vec<(usize, ArtifactReference)> = KOTLIN_PLUGIN
            .captures_iter(text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                Some((start, ArtifactReference::plugin(&caps[1], &caps[2])))
            })
            .collect();
        plugins.extend(KOTLIN_SHORTHAND_PLUGIN.captures_iter(text).filter_map(|caps| {
            let start = caps.get(0)?.start();
            let id = format!("org.jetbrains.kotlin.{}", &caps[1]);
            Some((start, ArtifactReference::plugin(&id, &caps[2])))
        }));
        plugins.sort_by_key(|(start, _)| *start);

        references.extend(plugins.into_iter().map(|(_, reference)| reference));
        Ok(references)
    }
}

static TOML_VERSIONS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\[versions\][ \t]*(?:#.*)?$").expect("header regex is valid")
});

static TOML_NEXT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\[").expect("header regex is valid"));

/// Gradle's `libs.versions.toml`: `[versions]` holds the definitions,
/// `[libraries]` and `[plugins]` cite them with `version.ref`.
pub struct TomlCatalog;

impl TomlCatalog {
    fn parse(text: &str) -> Result<DocumentMut> {
        text.parse::<DocumentMut>()
            .map_err(|e| DeppyError::Catalog(format!("Failed to parse version catalog: {e}")))
    }

    /// Body of the `[versions]` table with its byte offset in `text`.
    fn versions_section(text: &str) -> Option<(usize, &str)> {
        let header = TOML_VERSIONS_HEADER.find(text)?;
        let body = &text[header.end()..];
        let end = TOML_NEXT_HEADER
            .find(body)
            .map(|m| m.start())
            .unwrap_or(body.len());
        Some((header.end(), &body[..end]))
    }

    /// Source text declaring `key` and its offset in `section`, located by
    /// key and value so that formatting and comments are preserved on rewrite.
    fn declaration_text(section: &str, key: &str, value: &str) -> Option<(usize, String)> {
        let key = regex::escape(key);
        let value = regex::escape(value);
        let pattern = format!(
            r#"(?m)^[ \t]*(?:{key}|"{key}"|'{key}')[ \t]*=[ \t]*(?:"{value}"|'{value}')"#
        );
        let line = Regex::new(&pattern).ok()?;
        line.find(section).map(|m| (m.start(), m.as_str().to_string()))
    }
}

impl CatalogSyntax for TomlCatalog {
    fn version_definitions(&self, text: &str) -> Result<Vec<VersionDefinition>> {
        let doc = Self::parse(text)?;
        let Some(versions) = doc.get("versions").and_then(|item| item.as_table_like()) else {
            return Ok(Vec::new());
        };
        let (section_start, section) = Self::versions_section(text).unwrap_or((0, text));

        let mut definitions = Vec::new();
        for (key, item) in versions.iter() {
            let Some(value) = TomlUtils::extract_plain_version(item) else {
                tracing::debug!(key, "Skipping non-string version entry");
                continue;
            };
            match Self::declaration_text(section, key, &value) {
                Some((start, raw)) => definitions
                    .push(VersionDefinition::new(key, value, raw).at(section_start + start)),
                None => tracing::debug!(key, "Could not locate version declaration text"),
            }
        }
        Ok(dedup_keys(definitions))
    }

    fn artifact_references(&self, text: &str) -> Result<Vec<ArtifactReference>> {
        let doc = Self::parse(text)?;
        let mut references = Vec::new();

        if let Some(libraries) = doc.get("libraries").and_then(|item| item.as_table_like()) {
            for (_, item) in libraries.iter() {
                let Some(details) = TomlUtils::extract_library_details(item) else {
                    continue;
                };
                if let Some(key) = details.version_ref {
                    references.push(ArtifactReference::dependency(
                        &details.group,
                        &details.artifact,
                        &key,
                    ));
                }
            }
        }

        if let Some(plugins) = doc.get("plugins").and_then(|item| item.as_table_like()) {
            for (_, item) in plugins.iter() {
                if let (Some(id), Some(key)) = (
                    TomlUtils::extract_plugin_id(item),
                    TomlUtils::extract_version_ref(item),
                ) {
                    references.push(ArtifactReference::plugin(&id, &key));
                }
            }
        }

        Ok(references)
    }
}
