//! Startup configuration: compiled-in defaults, overridden by an optional
//! `config.toml`, overridden again by CLI flags. Mirrors the layered
//! precedence, layered on top of `std::env::var(..)`-style overrides, made
//! typed and fallible.

use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_host: String,
    pub bind_port: u16,

    pub max_iterations: usize,
    pub max_wall_time_secs: u64,
    pub patience: usize,
    pub min_relative_improvement: f64,

    pub session_ttl_secs: u64,
    pub sweeper_interval_secs: u64,
    pub gate_timeout_ms: u64,

    pub log_level: String,
    pub log_dir: PathBuf,

    pub tree_path: PathBuf,
    pub engine_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 5000,
            max_iterations: 600,
            max_wall_time_secs: 300,
            patience: 3,
            min_relative_improvement: 0.001,
            session_ttl_secs: 24 * 60 * 60,
            sweeper_interval_secs: 60 * 60,
            gate_timeout_ms: 1_000,
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            tree_path: PathBuf::from("data/tree.json"),
            engine_path: PathBuf::from("vendor/engine/headless.lua"),
        }
    }
}

impl Config {
    /// Loads defaults, merges an optional TOML file, then applies CLI
    /// overrides. Later sources win.
    pub fn load(
        config_path: Option<&PathBuf>,
        overrides: ConfigOverrides,
    ) -> Result<Self, OptimizerError> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let text = std::fs::read_to_string(path).map_err(|e| OptimizerError::Internal {
                    reason: format!("reading config file {}: {e}", path.display()),
                })?;
                config = toml::from_str(&text).map_err(|e| OptimizerError::Internal {
                    reason: format!("parsing config file {}: {e}", path.display()),
                })?;
            }
        }

        overrides.apply(&mut config);
        Ok(config)
    }

    pub fn max_wall_time(&self) -> Duration {
        Duration::from_secs(self.max_wall_time_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweeper_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper_interval_secs)
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }
}

/// CLI-supplied overrides, applied last so they always win.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub bind_host: Option<String>,
    pub bind_port: Option<u16>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.bind_host {
            config.bind_host = host;
        }
        if let Some(port) = self.bind_port {
            config.bind_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}
