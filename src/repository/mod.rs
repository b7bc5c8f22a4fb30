use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

pub mod factory;
pub use factory::RepositoryFactory;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coordinate {
    Dependency { group: String, artifact: String },
    Plugin { id: String },
}

impl Coordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::Dependency {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    pub fn plugin(plugin_id: impl Into<String>) -> Self {
        Self::Plugin {
            id: plugin_id.into(),
        }
    }

    pub fn is_plugin(&self) -> bool {
        matches!(self, Self::Plugin { .. })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependency { group, artifact } => write!(f, "{group}:{artifact}"),
            Self::Plugin { id } => write!(f, "plugin {id}"),
        }
    }
}

/// A registry able to list published versions of an artifact.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// All known versions, newest first. An unknown artifact yields an empty list.
    async fn fetch_available_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>>;
}
