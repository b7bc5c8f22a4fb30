pub mod plugin_portal;
pub mod repository;
pub mod version;

pub use plugin_portal::PluginPortalClient;
pub use repository::{MavenRepository, parse_maven_coordinate};
