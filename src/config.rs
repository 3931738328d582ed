//! Configuration types for batch-zip

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for [`BatchZipService`](crate::BatchZipService)
///
/// Fields are organized into sub-configs, one per pipeline stage. Every field
/// has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// HTTP client settings used for every fetch
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Per-URL retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch orchestration settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Temporary artifact storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background removal of artifacts that were never retrieved
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Temporary artifact directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.storage.temp_dir
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.storage.compression_level > 9 {
            return Err(crate::Error::Config {
                message: format!(
                    "compression level must be between 0 and 9, got {}",
                    self.storage.compression_level
                ),
                key: Some("storage.compression_level".to_string()),
            });
        }
        if self.batch.max_concurrent_fetches == Some(0) {
            return Err(crate::Error::Config {
                message: "max_concurrent_fetches must be at least 1 when set".to_string(),
                key: Some("batch.max_concurrent_fetches".to_string()),
            });
        }
        if self.sweeper.enabled && self.sweeper.interval.is_zero() {
            return Err(crate::Error::Config {
                message: "sweeper interval must be non-zero".to_string(),
                key: Some("sweeper.interval".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(crate::Error::Config {
                message: format!(
                    "backoff multiplier must be >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Total timeout for one attempt, including reading the body (default: 30 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Timeout for establishing the connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for failed fetch attempts
///
/// The defaults give a bounded retry with constant backoff: 3 retries
/// (4 attempts total), 1000 ms apart.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds (default: 1000)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries, in milliseconds (default: 60000)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0 = constant)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Batch orchestration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchConfig {
    /// Upper bound on fetches in flight for one batch (None = all at once)
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

/// Temporary artifact storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Directory holding produced archives (default: `<system temp>/batch-zip`)
    #[serde(default = "default_temp_dir")]
    #[schema(value_type = String)]
    pub temp_dir: PathBuf,

    /// Deflate compression level, 0-9 (default: 9 = maximum)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            compression_level: default_compression_level(),
        }
    }
}

/// Sweeper configuration for artifacts that are never retrieved
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SweeperConfig {
    /// Run the sweeper (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often to sweep, in seconds (default: 300)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub interval: Duration,

    /// Artifacts older than this are removed, in seconds (default: 3600)
    #[serde(default = "default_sweep_max_age", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_age: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_sweep_interval(),
            max_age: default_sweep_max_age(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:3000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("batch-zip/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("batch-zip")
}

fn default_compression_level() -> u32 {
    9
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_sweep_max_age() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
