//! Configuration
//!
//! Layered configuration for the importer: built-in defaults, the global
//! config file, an optional explicit file, then `SYNCSPACE_*` environment
//! variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncspaceConfig {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source host (GitHub REST API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Per-user access token; falls back to `GITHUB_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl GitHubConfig {
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            token: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Shared Document Store (sync service) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Compare-and-swap attempts per storage mutation
    #[serde(default = "default_cas_attempts")]
    pub cas_attempts: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            secret: None,
            cas_attempts: default_cas_attempts(),
        }
    }
}

/// Import pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum in-flight source requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Walk attempts before giving up on a retryable source error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Attempts per publication step
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: usize,
}

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 16;

impl ImportConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(20) as u32;
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            publish_attempts: default_publish_attempts(),
        }
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    format!("syncspace-importer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_store_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_cas_attempts() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    6
}

fn default_max_attempts() -> usize {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_publish_attempts() -> usize {
    3
}
