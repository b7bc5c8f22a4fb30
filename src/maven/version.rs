use std::cmp::Ordering;

/// Published version string with an ordering suitable for Maven-style
/// registries, where strict semver is the exception rather than the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    parsed: VersionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionType {
    Semantic(semver::Version),
    Release {
        numbers: Vec<u64>,
        qualifier: Option<String>,
    },
    Snapshot(Vec<u64>),
}

const RELEASE_QUALIFIERS: &[&str] = &["final", "ga", "release"];

impl Version {
    pub fn parse(version: &str) -> Self {
        let (numbers, qualifier) = Self::split_release(version);
        let is_snapshot = qualifier
            .as_deref()
            .is_some_and(|q| q.to_ascii_lowercase().ends_with("snapshot"));

        let parsed = if is_snapshot {
            VersionType::Snapshot(numbers)
        } else if let Ok(v) = semver::Version::parse(version) {
            VersionType::Semantic(v)
        } else {
            match qualifier {
                Some(q) if RELEASE_QUALIFIERS.contains(&q.to_ascii_lowercase().as_str()) => {
                    VersionType::Release {
                        numbers,
                        qualifier: None,
                    }
                }
                qualifier => VersionType::Release { numbers, qualifier },
            }
        };

        Version {
            original: version.to_string(),
            parsed,
        }
    }

    /// Splits `1.2.3-rc1` / `1.2.3.RELEASE` into numeric components and a
    /// trailing qualifier.
    fn split_release(version: &str) -> (Vec<u64>, Option<String>) {
        let mut numbers = Vec::new();
        let mut rest = version;

        loop {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                break;
            }
            match rest[..digits].parse::<u64>() {
                Ok(n) => numbers.push(n),
                Err(_) => break,
            }
            rest = &rest[digits..];
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        let qualifier = rest.trim_start_matches(['.', '-', '_', '+']);
        let qualifier = (!qualifier.is_empty()).then(|| qualifier.to_string());
        (numbers, qualifier)
    }

    fn numbers(&self) -> Vec<u64> {
        match &self.parsed {
            VersionType::Semantic(v) => vec![v.major, v.minor, v.patch],
            VersionType::Release { numbers, .. } | VersionType::Snapshot(numbers) => {
                numbers.clone()
            }
        }
    }

    fn rank(&self) -> u8 {
        match &self.parsed {
            VersionType::Snapshot(_) => 0,
            VersionType::Semantic(v) if !v.pre.is_empty() => 1,
            VersionType::Release {
                qualifier: Some(_), ..
            } => 1,
            _ => 2,
        }
    }

    fn compare_numbers(a: &[u64], b: &[u64]) -> Ordering {
        let len = a.len().max(b.len());
        for i in 0..len {
            let av = a.get(i).copied().unwrap_or(0);
            let bv = b.get(i).copied().unwrap_or(0);
            match av.cmp(&bv) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (VersionType::Semantic(a), VersionType::Semantic(b)) = (&self.parsed, &other.parsed)
        {
            return a.cmp(b);
        }

        Self::compare_numbers(&self.numbers(), &other.numbers())
            .then_with(|| self.rank().cmp(&other.rank()))
            .then_with(|| self.original.cmp(&other.original))
    }
}

/// Deduplicates and orders versions from newest to oldest.
pub fn newest_first(versions: Vec<String>) -> Vec<String> {
    let mut parsed: Vec<Version> = versions.iter().map(|v| Version::parse(v)).collect();
    parsed.sort();
    parsed.dedup_by(|a, b| a.original == b.original);
    parsed.into_iter().rev().map(|v| v.original).collect()
}
