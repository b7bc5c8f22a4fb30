pub mod config_parser;
pub mod distribution;
pub mod wrapper;

pub use config_parser::{GradleConfigParser, Repository};
pub use distribution::{DistributionClient, DistributionRelease, GradleServicesClient};
pub use wrapper::WrapperUpdater;
