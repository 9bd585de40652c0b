//! Layered CLI configuration: built-in defaults, then a TOML file, then
//! `-S key=value` overrides, then explicit command-line flags.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{CliOverrides, build_config};
pub use file::user_config_path;
pub use models::AppConfig;
