//! Configuration for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV_VAR: &str = "DOC_INGEST_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// HTTP API configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Ingestion worker configuration
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Client proxy configuration
    #[serde(default)]
    pub client: ClientConfig,
    /// Document database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Lifecycle coordinator configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl IngestConfig {
    /// Load configuration from the file named by `DOC_INGEST_CONFIG`, or defaults
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.worker.validate()
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}

/// Ingestion worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Lower bound of the simulated processing delay (inclusive)
    pub min_delay_ms: u64,
    /// Upper bound of the simulated processing delay (exclusive)
    pub max_delay_ms: u64,
    /// Probability that a job completes successfully
    pub success_probability: f64,
    /// Fixed RNG seed; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Age after which terminal status records are evicted; never when absent
    #[serde(default)]
    pub status_ttl_secs: Option<u64>,
    /// How often the eviction sweep runs
    pub sweep_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            min_delay_ms: 5_000,
            max_delay_ms: 10_000,
            success_probability: 0.8,
            seed: None,
            status_ttl_secs: Some(3600),
            sweep_interval_secs: 60,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms == 0 {
            return Err(Error::Config("worker min_delay_ms must be positive".to_string()));
        }
        if self.min_delay_ms >= self.max_delay_ms {
            return Err(Error::Config(format!(
                "worker delay window [{}, {}) is empty",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(Error::Config(format!(
                "worker success_probability {} is outside [0, 1]",
                self.success_probability
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config("worker sweep_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Terminal record TTL as a duration
    pub fn status_ttl(&self) -> Option<Duration> {
        self.status_ttl_secs.map(Duration::from_secs)
    }

    /// Listen address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Worker address to connect to
    pub worker_address: String,
    /// Per-request timeout; requests wait indefinitely when absent
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            worker_address: "127.0.0.1:3001".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Document database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doc-ingest")
            .join("documents.db");

        Self { path }
    }
}

/// Lifecycle coordinator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Persist PROCESSING and `last_processed_at` before dispatching a trigger.
    /// Off by default: the persisted status catches up on the next status poll.
    #[serde(default)]
    pub write_through_on_trigger: bool,
}
