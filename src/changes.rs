use std::fmt;

pub const CATALOG_SECTION: &str = "Gradle dependencies";
pub const WRAPPER_SECTION: &str = "Build System";
pub const MANIFEST_SECTION: &str = "Frontend dependencies";

/// One human-readable line describing an applied update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub title: String,
    pub description: String,
}

impl ChangeRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.title, self.description)
    }
}

/// Ordered, duplicate-free list of changes collected during a run.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the record unless an identical one is already present.
    pub fn push(&mut self, record: ChangeRecord) -> bool {
        if self.records.contains(&record) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn extend(&mut self, other: ChangeSet) {
        for record in other.records {
            self.push(record);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Markdown summary used for both the commit message and the PR body.
    ///
    /// Sections appear in the order their first record was added.
    pub fn describe(&self) -> String {
        let mut titles: Vec<&str> = Vec::new();
        for record in &self.records {
            if !titles.contains(&record.title.as_str()) {
                titles.push(&record.title);
            }
        }

        let mut description = String::from("The following dependencies have been updated:\n\n");
        for title in titles {
            description.push_str(&format!("### {title}\n"));
            for record in self.records.iter().filter(|r| r.title == title) {
                description.push_str(&format!("* {}\n", record.description));
            }
            description.push('\n');
        }
        description
    }
}
