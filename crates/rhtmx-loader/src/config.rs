//! Resource cache configuration types

use crate::plan::CacheStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Strategy for resources that do not name one
    pub default_strategy: CacheStrategy,

    /// Freshness window for resources that do not name one
    pub default_ttl: Duration,

    /// Base URL relative requests are resolved against
    pub base_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_strategy: CacheStrategy::StaleWhileRevalidate,
            default_ttl: Duration::from_secs(60),
            base_url: None,
        }
    }
}

/// TOML configuration for the `[cache]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTomlConfig {
    /// Default freshness window in seconds
    #[serde(default = "default_ttl_secs")]
    pub default_ttl: u64,

    /// Default strategy: "stale-while-revalidate", "cache-first", "network-first" or "no-store"
    #[serde(default)]
    pub default_strategy: CacheStrategy,

    /// Base URL for relative requests
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_ttl_secs() -> u64 {
    60
}

impl Default for CacheTomlConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl_secs(),
            default_strategy: CacheStrategy::default(),
            base_url: None,
        }
    }
}

impl CacheTomlConfig {
    /// Parse the `[cache]` table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse cache configuration")
    }

    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> Result<CacheConfig> {
        if let Some(ref base) = self.base_url {
            url::Url::parse(base)
                .with_context(|| format!("Invalid cache base_url: {}", base))?;
        }

        Ok(CacheConfig {
            default_strategy: self.default_strategy,
            default_ttl: Duration::from_secs(self.default_ttl),
            base_url: self.base_url.clone(),
        })
    }
}
