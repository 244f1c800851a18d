// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{load_config, load_config_from};
pub use settings::{ClientConfig, Config, ServerConfig, DEFAULT_PORT_ENV_VAR};
