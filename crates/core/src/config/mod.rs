//! Configuration parameters passed from the caller to every engine

mod loader;
mod parameters;

// Re-export main types
pub use loader::{find_config_file, ConfigurationParametersBuilder, CONFIG_FILE_NAMES, ENV_PREFIX};
pub use parameters::ConfigurationParameters;
