// Configuration structs

use serde::{Deserialize, Serialize};

/// Environment variable carrying the control server port to step commands
pub const DEFAULT_PORT_ENV_VAR: &str = "WORKER_SERVER_PORT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control server settings (daemon side)
    #[serde(default)]
    pub server: ServerConfig,

    /// Step command settings (client side)
    #[serde(default)]
    pub client: ClientConfig,
}

/// Control server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address; port 0 lets the OS pick one
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:0".to_string()
}

/// Step command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Environment variable holding the control port
    #[serde(default = "default_port_env_var")]
    pub port_env_var: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            port_env_var: default_port_env_var(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    5 * 60
}

fn default_port_env_var() -> String {
    DEFAULT_PORT_ENV_VAR.to_string()
}
