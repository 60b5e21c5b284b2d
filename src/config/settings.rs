use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// User directory backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// "postgres" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Database URL (postgres backend only)
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Push transport backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// "http" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Batch-send endpoint (http backend only)
    pub endpoint: Option<String>,
    /// Bearer key for the push transport
    pub api_key: Option<String>,
    /// Maximum tokens per batch request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_batch_size() -> usize {
    500
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("directory.backend", "memory")?
            .set_default("directory.pool_size", 5)?
            .set_default("delivery.backend", "memory")?
            .set_default("delivery.batch_size", 500)?
            .set_default("delivery.timeout_seconds", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, DIRECTORY_URL, DELIVERY_ENDPOINT, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            pool_size: default_pool_size(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            api_key: None,
            batch_size: default_batch_size(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
