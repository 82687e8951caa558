//! Optional `hoist.toml` configuration.
//!
//! Resolution order: a `hoist.toml` in the project root wins over the one in
//! the global config directory. Every tuning knob has a default, so the file
//! only needs the controller endpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::deploy::DeployTuning;

pub const CONFIG_FILE_NAME: &str = "hoist.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoistConfig {
    /// Controller endpoint, e.g. `https://api.paas.example.com`.
    pub controller: Url,
    /// Login name for the controller session.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub defaults: DeployDefaults,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Per-deployment defaults applied when the caller leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployDefaults {
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
}

impl Default for DeployDefaults {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
        }
    }
}

fn default_memory_mb() -> u32 {
    512
}

/// Executor budgets and verification polling, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_upload_secs")]
    pub upload_secs: u64,
    #[serde(default = "default_control_secs")]
    pub control_secs: u64,
    #[serde(default = "default_start_poll_attempts")]
    pub start_poll_attempts: u32,
    #[serde(default = "default_start_poll_interval_secs")]
    pub start_poll_interval_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upload_secs: default_upload_secs(),
            control_secs: default_control_secs(),
            start_poll_attempts: default_start_poll_attempts(),
            start_poll_interval_secs: default_start_poll_interval_secs(),
        }
    }
}

fn default_upload_secs() -> u64 {
    600
}

fn default_control_secs() -> u64 {
    60
}

fn default_start_poll_attempts() -> u32 {
    60
}

fn default_start_poll_interval_secs() -> u64 {
    2
}

impl TimeoutConfig {
    pub fn tuning(&self) -> DeployTuning {
        DeployTuning {
            upload_budget: Duration::from_secs(self.upload_secs),
            control_budget: Duration::from_secs(self.control_secs),
            start_poll_attempts: self.start_poll_attempts,
            start_poll_interval: Duration::from_secs(self.start_poll_interval_secs),
        }
    }
}

impl HoistConfig {
    /// Load from the project root override or the global config directory.
    /// `Ok(None)` when neither file exists.
    pub fn load(project_root: &Path) -> anyhow::Result<Option<Self>> {
        match Self::find(project_root) {
            Some(path) => Self::load_from(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Load a specific config file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// First existing config file, project root first.
    pub fn find(project_root: &Path) -> Option<PathBuf> {
        let local = project_root.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        let global = global_config_dir().join(CONFIG_FILE_NAME);
        global.exists().then_some(global)
    }
}

/// Global config directory, `~/.config/hoist` as the fallback.
pub fn global_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("hoist"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("hoist")
        })
}
