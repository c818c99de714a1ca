//! Layered configuration for Heatforge
//!
//! Values are resolved in order:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config heatforge.toml`)
//! 3. `HEATFORGE__SECTION__KEY` environment variables
//!
//! The generator API key additionally falls back to `ANTHROPIC_API_KEY`.

use crate::error::{HeatforgeError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "HEATFORGE";

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,

    /// Prefix for asset URLs embedded in preview documents
    #[serde(default)]
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3002".to_string(),
            public_base_url: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr.parse().map_err(|e| {
            HeatforgeError::Config(config::ConfigError::Message(format!(
                "server.addr '{}' is not a socket address: {}",
                self.addr, e
            )))
        })
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the libSQL database file
    pub database_path: String,

    /// Skip the persistent backend entirely
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path().to_string_lossy().to_string(),
            in_memory: false,
        }
    }
}

/// Default database path using XDG_DATA_HOME standard
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("heatforge")
        .join("heatforge.db")
}

/// Optimization loop thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Auto-optimize when a click counter reaches a multiple of this value
    pub click_threshold: u64,

    /// Minimum distinct heatmap points before a non-forced run
    pub min_heatmap_points: usize,

    /// Minimum time between non-forced optimizations of the same original site
    #[serde(with = "serde_duration")]
    pub cooldown: Duration,

    /// Upper bound on a single content-generator call
    #[serde(with = "serde_duration")]
    pub generator_timeout: Duration,

    /// Number of ranked click elements fed into the generation request
    pub click_element_limit: usize,

    /// Number of heatmap points listed in the generation request
    pub heatmap_prompt_limit: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            click_threshold: 50,
            min_heatmap_points: 10,
            cooldown: Duration::from_secs(3600), // 1 hour
            generator_timeout: Duration::from_secs(60),
            click_element_limit: 10,
            heatmap_prompt_limit: 20,
        }
    }
}

/// Content generator (LLM) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API key; empty means the generator is unavailable
    #[serde(default)]
    pub api_key: String,

    pub model: String,

    /// Base URL of the messages API
    pub base_url: String,

    pub max_tokens: usize,

    pub temperature: f32,

    /// Retries after the first attempt for retryable upstream failures
    pub max_retries: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-5-haiku-20241022".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 16000,
        }
    }
}

// Custom serde module for Duration (serialize/deserialize as seconds)
mod serde_duration {
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

impl AppConfig {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;

        if cfg.generator.api_key.is_empty() {
            if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
                debug!("Using generator API key from ANTHROPIC_API_KEY");
                cfg.generator.api_key = key;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse configuration from a TOML string (no environment layering)
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(toml_str).map_err(|e| {
            HeatforgeError::Config(config::ConfigError::Message(format!(
                "Failed to parse config: {}",
                e
            )))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;

        let opt = &self.optimizer;
        if opt.click_threshold == 0 {
            return Err(invalid("optimizer.click_threshold must be at least 1"));
        }
        if opt.generator_timeout.is_zero() {
            return Err(invalid("optimizer.generator_timeout must be positive"));
        }
        if opt.click_element_limit == 0 {
            return Err(invalid("optimizer.click_element_limit must be at least 1"));
        }

        let gen = &self.generator;
        if gen.max_backoff_ms < gen.initial_backoff_ms {
            return Err(invalid(
                "generator.max_backoff_ms must not be below generator.initial_backoff_ms",
            ));
        }
        if !(0.0..=1.0).contains(&gen.temperature) {
            return Err(invalid("generator.temperature must be between 0.0 and 1.0"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> HeatforgeError {
    HeatforgeError::Config(config::ConfigError::Message(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.optimizer.click_threshold, 50);
        assert_eq!(cfg.optimizer.min_heatmap_points, 10);
        assert_eq!(cfg.optimizer.cooldown, Duration::from_secs(3600));
    }

    #[test]
    fn test_from_toml_partial() {
        let cfg = AppConfig::from_toml(
            r#"
            [optimizer]
            click_threshold = 20
            min_heatmap_points = 5
            cooldown = 1800
            generator_timeout = 45
            click_element_limit = 10
            heatmap_prompt_limit = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.optimizer.click_threshold, 20);
        assert_eq!(cfg.optimizer.cooldown, Duration::from_secs(1800));
        assert_eq!(cfg.server.addr, "127.0.0.1:3002");
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut cfg = AppConfig::default();
        cfg.optimizer.click_threshold = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("click_threshold"));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut cfg = AppConfig::default();
        cfg.generator.initial_backoff_ms = 5000;
        cfg.generator.max_backoff_ms = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_addr() {
        let mut cfg = AppConfig::default();
        cfg.server.addr = "not-an-addr".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_layers_file_and_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[optimizer]\nclick_threshold = 25\nmin_heatmap_points = 3\ncooldown = 600\ngenerator_timeout = 30\nclick_element_limit = 5\nheatmap_prompt_limit = 10"
        )
        .unwrap();

        env::set_var("HEATFORGE__OPTIMIZER__MIN_HEATMAP_POINTS", "7");
        env::remove_var("ANTHROPIC_API_KEY");
        let cfg = AppConfig::load(Some(file.path())).unwrap();
        env::remove_var("HEATFORGE__OPTIMIZER__MIN_HEATMAP_POINTS");

        assert_eq!(cfg.optimizer.click_threshold, 25);
        assert_eq!(cfg.optimizer.min_heatmap_points, 7);
        assert_eq!(cfg.optimizer.cooldown, Duration::from_secs(600));
    }

    #[test]
    #[serial]
    fn test_api_key_env_fallback() {
        env::set_var("ANTHROPIC_API_KEY", "sk-test");
        let cfg = AppConfig::load(None).unwrap();
        env::remove_var("ANTHROPIC_API_KEY");
        assert_eq!(cfg.generator.api_key, "sk-test");
    }
}
