//! xdc-config: layered TOML configuration for the xdc debugger client.

pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{BrowserConfig, Config, DbgpConfig, LogConfig, LogLevel};
pub use error::ConfigError;
pub use load::{default_config_dir, load_config, load_from_str};
