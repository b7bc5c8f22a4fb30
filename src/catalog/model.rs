use crate::repository::Coordinate;
use std::collections::HashMap;

/// A version declared once in a catalog and cited by artifacts through its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDefinition {
    pub key: String,
    pub current_value: String,
    /// Exact source text of the declaration, used as the replacement anchor.
    pub raw_text: String,
    /// Byte offset of `raw_text` in the catalog text it was read from.
    pub offset: usize,
}

impl VersionDefinition {
    pub fn new(
        key: impl Into<String>,
        current_value: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            current_value: current_value.into(),
            raw_text: raw_text.into(),
            offset: 0,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.raw_text.len()
    }

    /// The declaration text with only its quoted value swapped for `new_value`.
    pub fn with_value(&self, new_value: &str) -> String {
        for quote in ['"', '\''] {
            let needle = format!("{quote}{}{quote}", self.current_value);
            if let Some(pos) = self.raw_text.rfind(&needle) {
                let mut text = String::with_capacity(self.raw_text.len() + new_value.len());
                text.push_str(&self.raw_text[..pos]);
                text.push(quote);
                text.push_str(new_value);
                text.push(quote);
                text.push_str(&self.raw_text[pos + needle.len()..]);
                return text;
            }
        }
        self.raw_text
            .replacen(&self.current_value, new_value, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub coordinate: Coordinate,
    pub key: String,
}

impl ArtifactReference {
    pub fn dependency(group: &str, artifact: &str, key: &str) -> Self {
        Self {
            coordinate: Coordinate::new(group, artifact),
            key: key.to_string(),
        }
    }

    pub fn plugin(id: &str, key: &str) -> Self {
        Self {
            coordinate: Coordinate::plugin(id),
            key: key.to_string(),
        }
    }
}

/// Version key → citing artifacts, in discovery order.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    keys: Vec<String>,
    by_key: HashMap<String, Vec<Coordinate>>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: ArtifactReference) {
        let ArtifactReference { coordinate, key } = reference;
        match self.by_key.get_mut(&key) {
            Some(coordinates) => {
                if !coordinates.contains(&coordinate) {
                    coordinates.push(coordinate);
                }
            }
            None => {
                self.keys.push(key.clone());
                self.by_key.insert(key, vec![coordinate]);
            }
        }
    }

    pub fn extend(&mut self, references: impl IntoIterator<Item = ArtifactReference>) {
        for reference in references {
            self.insert(reference);
        }
    }

    pub fn references(&self, key: &str) -> &[Coordinate] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_value_touches_only_the_quoted_value() {
        let definition = VersionDefinition::new("v1", "1", r#"val v1 = "1""#);
        assert_eq!(definition.with_value("2"), r#"val v1 = "2""#);

        let toml = VersionDefinition::new("kotlin", "1.9.0", "kotlin = '1.9.0'");
        assert_eq!(toml.with_value("2.0.0"), "kotlin = '2.0.0'");
    }

    #[test]
    fn index_preserves_discovery_order_and_skips_duplicates() {
        let mut index = ReferenceIndex::new();
        index.extend([
            ArtifactReference::dependency("com.fasterxml.jackson.core", "jackson-core", "jackson"),
            ArtifactReference::plugin("org.jetbrains.kotlin.jvm", "kotlin"),
            ArtifactReference::dependency("com.fasterxml.jackson.core", "jackson-databind", "jackson"),
            ArtifactReference::dependency("com.fasterxml.jackson.core", "jackson-core", "jackson"),
        ]);

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["jackson", "kotlin"]);
        assert_eq!(
            index.references("jackson"),
            &[
                Coordinate::new("com.fasterxml.jackson.core", "jackson-core"),
                Coordinate::new("com.fasterxml.jackson.core", "jackson-databind"),
            ]
        );
        assert!(index.references("missing").is_empty());
    }
}
