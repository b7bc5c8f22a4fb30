use crate::maven::parse_maven_coordinate;
use toml_edit::Item;

/// Canonical representation of a library entry inside the version catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDetails {
    pub group: String,
    pub artifact: String,
    pub version_ref: Option<String>,
}

/// Helpers for reading entries of a Gradle version catalog (`libs.versions.toml`).
pub struct TomlUtils;

impl TomlUtils {
    /// Extracts `(group, artifact)` from strings, inline tables, or standard tables.
    pub fn extract_group_artifact(item: &Item) -> Option<(String, String)> {
        if let Some(str_value) = item.as_str() {
            return parse_maven_coordinate(str_value).map(|(g, a, _)| (g, a));
        }

        if let Some(inline_table) = item.as_inline_table() {
            if let Some(module) = inline_table.get("module").and_then(|v| v.as_str()) {
                return parse_maven_coordinate(module).map(|(g, a, _)| (g, a));
            }

            if let (Some(group), Some(name)) = (
                inline_table.get("group").and_then(|v| v.as_str()),
                inline_table.get("name").and_then(|v| v.as_str()),
            ) {
                return Some((group.to_string(), name.to_string()));
            }
        }

        if let Some(table) = item.as_table() {
            if let Some(module) = table.get("module").and_then(|v| v.as_str()) {
                return parse_maven_coordinate(module).map(|(g, a, _)| (g, a));
            }

            if let (Some(group), Some(name)) = (
                table.get("group").and_then(|v| v.as_str()),
                table.get("name").and_then(|v| v.as_str()),
            ) {
                return Some((group.to_string(), name.to_string()));
            }
        }

        None
    }

    /// Extract a version reference key `{ version = { ref = "foo" } }`.
    pub fn extract_version_ref(item: &Item) -> Option<String> {
        if let Some(inline_table) = item.as_inline_table() {
            return inline_table
                .get("version")
                .and_then(|item| item.as_inline_table())
                .and_then(|table| table.get("ref"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        if let Some(table) = item.as_table() {
            if let Some(version_item) = table.get("version") {
                if let Some(as_table) = version_item.as_table() {
                    return as_table
                        .get("ref")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                }
                if let Some(as_inline) = version_item.as_inline_table() {
                    return as_inline
                        .get("ref")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                }
            }
        }

        None
    }

    /// Plugin id from `{ id = "..." }` entries or the `id:version` shorthand.
    pub fn extract_plugin_id(item: &Item) -> Option<String> {
        if let Some(raw) = item.as_str() {
            let id = raw.split(':').next().unwrap_or(raw).trim();
            return (!id.is_empty()).then(|| id.to_string());
        }

        if let Some(inline_table) = item.as_inline_table() {
            return inline_table
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        item.as_table()
            .and_then(|table| table.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// A string value of the `[versions]` table. Rich version tables
    /// (`{ strictly = ".." }`) are not supported and yield `None`.
    pub fn extract_plain_version(item: &Item) -> Option<String> {
        item.as_str().map(|s| s.to_string())
    }

    /// Extracts a normalized `LibraryDetails` from a library item.
    pub fn extract_library_details(item: &Item) -> Option<LibraryDetails> {
        if let Some(raw) = item.as_str() {
            let (group, artifact, _) = parse_maven_coordinate(raw)?;
            return Some(LibraryDetails {
                group,
                artifact,
                version_ref: None,
            });
        }

        let (group, artifact) = Self::extract_group_artifact(item)?;
        let version_ref = Self::extract_version_ref(item);

        Some(LibraryDetails {
            group,
            artifact,
            version_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml_edit::DocumentMut;

    #[test]
    fn extracts_group_artifact_from_string() {
        let doc: DocumentMut = r#"lib = "com.test:artifact:1.0.0""#.parse().unwrap();
        let item = doc.get("lib").unwrap();
        assert_eq!(
            TomlUtils::extract_group_artifact(item),
            Some(("com.test".to_string(), "artifact".to_string()))
        );
    }

    #[test]
    fn extracts_version_ref() {
        let doc: DocumentMut =
            r#"lib = { group = "com.test", name = "artifact", version = { ref = "core" } }"#
                .parse()
                .unwrap();
        let item = doc.get("lib").unwrap();
        assert_eq!(
            TomlUtils::extract_version_ref(item),
            Some("core".to_string())
        );
    }

    #[test]
    fn extracts_plugin_ids() {
        let doc: DocumentMut = r#"
            a = { id = "org.jetbrains.kotlin.jvm", version.ref = "kotlin" }
            b = "com.github.ben-manes.versions:0.51.0"
        "#
        .parse()
        .unwrap();
        assert_eq!(
            TomlUtils::extract_plugin_id(doc.get("a").unwrap()).as_deref(),
            Some("org.jetbrains.kotlin.jvm")
        );
        assert_eq!(
            TomlUtils::extract_version_ref(doc.get("a").unwrap()).as_deref(),
            Some("kotlin")
        );
        assert_eq!(
            TomlUtils::extract_plugin_id(doc.get("b").unwrap()).as_deref(),
            Some("com.github.ben-manes.versions")
        );
    }

    #[test]
    fn extracts_library_details_from_inline_definition() {
        let doc: DocumentMut =
            r#"lib = { group = "com.test", name = "artifact", version = "1.0.0" }"#
                .parse()
                .unwrap();
        let item = doc.get("lib").unwrap();
        let details = TomlUtils::extract_library_details(item).unwrap();
        assert_eq!(details.group, "com.test");
        assert_eq!(details.artifact, "artifact");
        assert!(details.version_ref.is_none());
    }

    #[test]
    fn extracts_library_details_with_version_reference() {
        let doc: DocumentMut =
            r#"lib = { module = "com.test:artifact", version = { ref = "core" } }"#
                .parse()
                .unwrap();
        let item = doc.get("lib").unwrap();
        let details = TomlUtils::extract_library_details(item).unwrap();
        assert_eq!(details.group, "com.test");
        assert_eq!(details.artifact, "artifact");
        assert_eq!(details.version_ref.as_deref(), Some("core"));
    }
}
