// File: src/config.rs
// Purpose: Router configuration, loadable from rhtmx.toml

use anyhow::{Context, Result};
use rhtmx_loader::CacheTomlConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Navigation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Base path all routes live under (e.g., "/app")
    #[serde(default = "default_base")]
    pub base: String,

    /// Whether string patterns match case-insensitively (default: true)
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// Preload links on hover and press (default: true)
    #[serde(default = "default_true")]
    pub preload_on_hover: bool,

    /// Hover debounce before a preload starts, in milliseconds
    #[serde(default = "default_preload_delay_ms")]
    pub preload_delay_ms: u64,

    /// Minimum interval between two region scroll captures, in milliseconds
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: u64,

    /// Session store key prefix for reload scroll continuity
    #[serde(default = "default_session_key_prefix")]
    pub session_key_prefix: String,

    /// Name of the router's private namespace inside history state
    #[serde(default = "default_state_key")]
    pub state_key: String,

    /// Resource cache settings (`[cache]` table)
    #[serde(default)]
    pub cache: CacheTomlConfig,
}

fn default_base() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_preload_delay_ms() -> u64 {
    20
}

fn default_scroll_throttle_ms() -> u64 {
    100
}

fn default_session_key_prefix() -> String {
    "__rhtmx_scroll:".to_string()
}

fn default_state_key() -> String {
    "__rhtmx".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            case_insensitive: true,
            preload_on_hover: true,
            preload_delay_ms: default_preload_delay_ms(),
            scroll_throttle_ms: default_scroll_throttle_ms(),
            session_key_prefix: default_session_key_prefix(),
            state_key: default_state_key(),
            cache: CacheTomlConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(content).context("Failed to parse router configuration")
    }

    /// Load configuration from a TOML file
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Builder: set the base path
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Builder: enable or disable hover preloading
    pub fn with_preload_on_hover(mut self, enabled: bool) -> Self {
        self.preload_on_hover = enabled;
        self
    }

    /// Builder: set case sensitivity of string patterns
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }
}
