//! Configuration
//!
//! File-backed settings shared between the poll loops, the alarm and the
//! delivery queue. Hot reload is an explicit `reload()` call; workers take a
//! snapshot at the start of each tick.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poll interval of the monitor/marketing loops in milliseconds
    pub poll_interval_ms: u64,
    /// Connectivity probe / delivery retry interval in milliseconds
    pub probe_interval_ms: u64,
    /// Whether detections start the looping alarm
    pub use_alarm: bool,
    /// Sound file name for the looping alarm
    pub alarm_sound: String,
    /// Template match confidence threshold (normalized cross-correlation)
    pub match_threshold: f64,
    /// Window title to match when enumerating candidate windows
    pub window_title: String,
    /// Bot token for the remote delivery endpoint
    pub bot_token: String,
    /// Chat ID for the remote delivery endpoint
    pub chat_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            probe_interval_ms: 5_000,
            use_alarm: true,
            alarm_sound: "alert_01.wav".to_string(),
            match_threshold: 0.95,
            window_title: "MU".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

struct Inner {
    path: Option<PathBuf>,
    config: RwLock<Config>,
}

/// Cheaply cloneable handle to the shared configuration
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<Inner>,
}

impl ConfigHandle {
    /// Creates a handle without file backing (tests, embedding)
    pub fn in_memory(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                config: RwLock::new(config),
            }),
        }
    }

    /// Loads from a JSON file; a missing file yields defaults
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else {
            info!("No config at {}, using defaults", path.display());
            Config::default()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                config: RwLock::new(config),
            }),
        })
    }

    /// Returns a copy of the current settings
    pub fn snapshot(&self) -> Config {
        self.inner.config.read().clone()
    }

    /// Re-reads the backing file, replacing the current settings
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        *self.inner.config.write() = config;
        info!("Configuration reloaded from {}", path.display());
        Ok(())
    }

    /// Applies a mutation to the shared settings
    pub fn update(&self, f: impl FnOnce(&mut Config)) {
        f(&mut self.inner.config.write());
    }

    /// Writes the current settings back to the backing file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(&*self.inner.config.read())?;
        fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::in_memory(Config::default())
    }
}
