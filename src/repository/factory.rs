use crate::error::Result;
use crate::gradle::Repository as GradleRepository;
use crate::maven::{MavenRepository, PluginPortalClient};
use crate::repository::RepositoryClient;
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_maven(repositories: Vec<GradleRepository>) -> Result<Arc<dyn RepositoryClient>> {
        let client = if repositories.is_empty() {
            MavenRepository::new()?
        } else {
            MavenRepository::with_repositories(repositories)?
        };
        Ok(Arc::new(client))
    }

    pub fn create_plugin_portal(portal_url: &str) -> Result<Arc<dyn RepositoryClient>> {
        let client = PluginPortalClient::with_url(portal_url)?;
        Ok(Arc::new(client))
    }
}
