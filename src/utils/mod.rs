pub mod path_validator;
pub mod toml;

pub use path_validator::PathValidator;
pub use toml::TomlUtils;
