use crate::cli::{Cli, OutputFormat};
use crate::http_client::HttpGetterConfig;
use crate::scanner::{ScanMode, ScanOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix of every environment variable the validator reads
pub const ENV_PREFIX: &str = "COPC_VALIDATOR_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub network: NetworkConfig,
    pub output: OutputConfig,
}

/// Node scan configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Read every point instead of the first point of each node
    pub deep: bool,
    /// Number of concurrent node scans
    pub workers: Option<usize>,
    /// Node scans allowed in flight at once
    pub queue_limit: Option<usize>,
    /// In deep mode, read at most this many points per node
    pub sample_size: Option<u64>,
    /// Show progress on stderr
    pub show_progress: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed range requests
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
    /// Omit decoded metadata from reports
    pub mini: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a configuration file in the working directory, then in the user
    /// config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        match Self::config_search_paths()
            .into_iter()
            .find(|path| path.exists())
        {
            Some(path) => Ok(Some(Self::load_from_file(&path).await?)),
            None => Ok(None),
        }
    }

    pub fn config_search_paths() -> Vec<PathBuf> {
        let config_names = [
            "copc-validator.toml",
            "copc-validator.json",
            ".copc-validator.toml",
            ".copc-validator.json",
        ];

        let mut paths: Vec<PathBuf> = config_names.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("copc-validator");
            paths.extend(config_names.iter().map(|name| app_config_dir.join(name)));
        }
        paths
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Scan settings
        if let Some(deep) = env_value(env, "DEEP")? {
            config.scan.deep = deep;
        }
        if let Some(workers) = env_value(env, "WORKERS")? {
            config.scan.workers = Some(workers);
        }
        if let Some(queue_limit) = env_value(env, "QUEUE_LIMIT")? {
            config.scan.queue_limit = Some(queue_limit);
        }
        if let Some(sample_size) = env_value(env, "SAMPLE_SIZE")? {
            config.scan.sample_size = Some(sample_size);
        }
        if let Some(progress) = env_value(env, "PROGRESS")? {
            config.scan.show_progress = progress;
        }

        // Network settings
        if let Some(timeout) = env_value(env, "TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = env_value(env, "RETRY_ATTEMPTS")? {
            config.network.retry_attempts = retry_attempts;
        }

        // Output settings
        if let Some(mini) = env_value(env, "MINI")? {
            config.output.mini = mini;
        }
        if let Some(verbose) = env_value(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = env_value(env, "QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(format) = env.get(&format!("{}FORMAT", ENV_PREFIX)) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {}FORMAT value: {}",
                        ENV_PREFIX, format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration. Only flags that were given
    /// override the configuration.
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        // Scan settings
        if cli.deep {
            config.scan.deep = true;
        }
        if cli.workers.is_some() {
            config.scan.workers = cli.workers;
        }
        if cli.queue_limit.is_some() {
            config.scan.queue_limit = cli.queue_limit;
        }
        if cli.sample_size.is_some() {
            config.scan.sample_size = cli.sample_size;
        }
        if cli.progress {
            config.scan.show_progress = true;
        }

        // Network settings
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }

        // Output settings
        if let Some(format) = cli.format {
            config.output.format = format;
        }
        if cli.mini {
            config.output.mini = true;
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        // Scan settings
        base.scan.deep = override_config.scan.deep;
        if override_config.scan.workers.is_some() {
            base.scan.workers = override_config.scan.workers;
        }
        if override_config.scan.queue_limit.is_some() {
            base.scan.queue_limit = override_config.scan.queue_limit;
        }
        if override_config.scan.sample_size.is_some() {
            base.scan.sample_size = override_config.scan.sample_size;
        }
        base.scan.show_progress = override_config.scan.show_progress;

        // Network settings
        base.network = override_config.network;

        // Output settings
        base.output = override_config.output;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(workers) = config.scan.workers
            && !(1..=1024).contains(&workers)
        {
            return Err(ConfigError::Validation(
                "Number of workers must be between 1 and 1024".to_string(),
            ));
        }

        if let Some(queue_limit) = config.scan.queue_limit
            && !(1..=1024).contains(&queue_limit)
        {
            return Err(ConfigError::Validation(
                "Queue limit must be between 1 and 1024".to_string(),
            ));
        }

        if config.scan.sample_size == Some(0) {
            return Err(ConfigError::Validation(
                "Sample size must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }

    /// Scan options described by the configuration, without a progress callback
    pub fn scan_options(config: &Config) -> ScanOptions {
        ScanOptions {
            mode: if config.scan.deep {
                ScanMode::Deep
            } else {
                ScanMode::Shallow
            },
            worker_count: config.scan.workers,
            queue_limit: config.scan.queue_limit,
            sample_size: config.scan.sample_size,
            progress: None,
        }
    }

    /// Range-request settings described by the configuration
    pub fn http_config(config: &Config) -> HttpGetterConfig {
        HttpGetterConfig {
            timeout_seconds: config.network.timeout_seconds,
            retry_attempts: config.network.retry_attempts,
            retry_delay_ms: config.network.retry_delay_ms,
            ..HttpGetterConfig::default()
        }
    }

    /// Get the effective worker count
    pub fn get_worker_count(config: &Config) -> usize {
        config.scan.workers.unwrap_or_else(num_cpus::get)
    }

    /// Convert configuration to Duration for network timeout
    pub fn get_timeout_duration(config: &Config) -> Duration {
        Duration::from_secs(config.network.timeout_seconds)
    }

    /// Convert configuration to Duration for retry delay
    pub fn get_retry_delay_duration(config: &Config) -> Duration {
        Duration::from_millis(config.network.retry_delay_ms)
    }
}

/// Parse `COPC_VALIDATOR_<name>` when it is set
fn env_value<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = format!("{}{}", ENV_PREFIX, name);
    match env.get(&key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value))),
        None => Ok(None),
    }
}
