use crate::error::AgentError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolConfig {
    #[serde(default = "default_pool_size")]
    pub size: usize,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_num_users")]
    pub num_users: u32,
    #[serde(default = "default_min_visit_interval")]
    pub min_visit_interval_secs: u64,
    #[serde(default = "default_max_visit_interval")]
    pub max_visit_interval_secs: u64,
    #[serde(default = "default_max_runtime_hours")]
    pub max_runtime_hours: u64,
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Optional seed for reproducible runs. Unset means entropy-seeded.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_minutes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_report_interval")]
    pub report_interval_minutes: u64,
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Defaults
fn default_db_path() -> String {
    "sitewatch.db".to_string()
}
fn default_pool_size() -> usize {
    10
}
fn default_acquire_timeout_ms() -> u64 {
    5000
}
fn default_num_users() -> u32 {
    5
}
fn default_min_visit_interval() -> u64 {
    1
}
fn default_max_visit_interval() -> u64 {
    10
}
fn default_max_runtime_hours() -> u64 {
    24
}
fn default_task_timeout() -> u64 {
    10
}
fn default_cache_ttl() -> u64 {
    5
}
fn default_report_interval() -> u64 {
    5
}
fn default_report_dir() -> String {
    ".".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            pool: PoolConfig::default(),
            simulation: SimulationConfig::default(),
            cache: CacheConfig::default(),
            stats: StatsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_users: default_num_users(),
            min_visit_interval_secs: default_min_visit_interval(),
            max_visit_interval_secs: default_max_visit_interval(),
            max_runtime_hours: default_max_runtime_hours(),
            task_timeout_secs: default_task_timeout(),
            seed: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_cache_ttl(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval_minutes: default_report_interval(),
            report_dir: default_report_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Startup validation. The only fatal error in the system.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.pool.size == 0 {
            return Err(AgentError::ConfigInvalid(
                "pool.size must be at least 1".to_string(),
            ));
        }
        if self.simulation.num_users == 0 {
            return Err(AgentError::ConfigInvalid(
                "simulation.num_users must be at least 1".to_string(),
            ));
        }
        if self.simulation.min_visit_interval_secs > self.simulation.max_visit_interval_secs {
            return Err(AgentError::ConfigInvalid(format!(
                "simulation.min_visit_interval_secs ({}) exceeds max_visit_interval_secs ({})",
                self.simulation.min_visit_interval_secs, self.simulation.max_visit_interval_secs
            )));
        }
        if self.simulation.task_timeout_secs == 0 {
            return Err(AgentError::ConfigInvalid(
                "simulation.task_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
