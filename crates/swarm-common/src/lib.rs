use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Smallest read buffer hyper accepts for an HTTP/1 connection.
pub const MIN_CHUNK_SIZE_BYTES: usize = 8192;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub viewer: ViewerConfig,
    pub population: PopulationConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parses a YAML document and validates the result.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.viewer.validate()
    }
}

/// Read-only settings shared by every viewer in the population.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ViewerConfig {
    pub base_url: String,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// Bounds the wait for response headers, each body chunk, and the whole catalog query.
    pub request_timeout_ms: u64,
    pub chunk_size_bytes: usize,
    pub iteration_sleep_ms: u64,
    pub iteration_jitter_ms: u64,
    pub error_cooldown_ms: u64,
    pub watch: WatchPolicy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            heartbeat_interval_ms: 5000,
            heartbeat_timeout_ms: 2000,
            request_timeout_ms: 10_000,
            chunk_size_bytes: MIN_CHUNK_SIZE_BYTES,
            iteration_sleep_ms: 1000,
            iteration_jitter_ms: 0,
            error_cooldown_ms: 5000,
            watch: WatchPolicy::default(),
        }
    }
}

impl ViewerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn iteration_sleep(&self) -> Duration {
        Duration::from_millis(self.iteration_sleep_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    /// Joins `path` onto the base URL, tolerating a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The client is built on hyper's plain HttpConnector.
        if !self.base_url.starts_with("http://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http:// URL, got {:?}",
                self.base_url
            )));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request timeouts must be positive".to_string(),
            ));
        }
        if self.chunk_size_bytes < MIN_CHUNK_SIZE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "chunk_size_bytes must be at least {}",
                MIN_CHUNK_SIZE_BYTES
            )));
        }
        match &self.watch {
            WatchPolicy::AlwaysStream { video } if video.trim().is_empty() => Err(
                ConfigError::Invalid("always_stream requires a video name".to_string()),
            ),
            WatchPolicy::Probabilistic { probability } if !(0.0..=1.0).contains(probability) => {
                Err(ConfigError::Invalid(format!(
                    "watch probability must be within [0, 1], got {}",
                    probability
                )))
            }
            _ => Ok(()),
        }
    }
}

/// How a viewer decides what to watch on each iteration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WatchPolicy {
    /// Full-watch the same video on every iteration.
    AlwaysStream { video: String },
    /// With the given probability, pick a random catalog entry and probe-watch it.
    Probabilistic { probability: f64 },
}

impl Default for WatchPolicy {
    fn default() -> Self {
        WatchPolicy::AlwaysStream {
            video: "sample.mp4".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PopulationConfig {
    pub workers: usize,
    /// Delay between consecutive viewer spawns.
    pub stagger_ms: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            stagger_ms: 50,
        }
    }
}

impl PopulationConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}
