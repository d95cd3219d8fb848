//! # Crewflow Config
//!
//! Unified single-file configuration management for Crewflow.
//! A single `crewflow.yaml` configures the task runner, store backends,
//! and observability settings.

mod loader;

pub use loader::{load_config, ConfigError};

use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration schema for Crewflow.
#[derive(Debug, Clone, Deserialize)]
pub struct CrewflowConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub stores: StoresConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for CrewflowConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            runner: RunnerConfig::default(),
            stores: StoresConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "crewflow".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

/// Task runner behavior: dispatch polling, concurrency, and the stuck-run
/// reaper.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Dispatch watcher polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum work items executing concurrently in this process.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Idempotent store-write retries before a finalize gives up.
    #[serde(default = "default_fault_retry_budget")]
    pub fault_retry_budget: u32,
    #[serde(default = "default_true")]
    pub reaper_enabled: bool,
    /// Age in seconds after which a `running` item with no status movement
    /// is considered stuck.
    #[serde(default = "default_reaper_timeout_secs")]
    pub reaper_timeout_secs: u64,
}

impl RunnerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reaper_timeout(&self) -> Duration {
        Duration::from_secs(self.reaper_timeout_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent: default_max_concurrent(),
            fault_retry_budget: default_fault_retry_budget(),
            reaper_enabled: true,
            reaper_timeout_secs: default_reaper_timeout_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_concurrent() -> usize {
    8
}

fn default_fault_retry_budget() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_reaper_timeout_secs() -> u64 {
    900
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoresConfig {
    #[serde(default)]
    pub status: StoreSpec,
    #[serde(default)]
    pub audit: StoreSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSpec {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub connection_url: Option<String>,
    /// Optional key prefix/namespace used by backend implementations.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Default for StoreSpec {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            connection_url: None,
            key_prefix: None,
        }
    }
}

fn default_backend() -> String {
    "in_memory".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
