//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML config file (`--config`, or the platform config directory)
//! 3. Environment variables prefixed with `DUPESORT_`
//! 4. CLI flags
//!
//! ```toml
//! workers = 4
//! queue_capacity = 256
//! progress = true
//! ```

use anyhow::Result;
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::pipeline::{PipelineConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DUPESORT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of hash workers.
    pub workers: usize,
    /// Capacity of each pipeline queue.
    pub queue_capacity: usize,
    /// Show progress spinners.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: false,
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or from the default location.
    pub fn load(path: Option<&Path>) -> Self {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_path(path),
            None => {
                log::debug!("No config directory available, using defaults and environment");
                Self::extract(
                    Figment::from(Serialized::defaults(Self::default()))
                        .merge(Env::prefixed(ENV_PREFIX)),
                )
            }
        }
    }

    /// Load the configuration from a specific TOML file plus the environment.
    ///
    /// A missing file contributes nothing. An unreadable or invalid file is
    /// logged and the defaults are used instead.
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        log::debug!("Loading config from {}", path.display());
        Self::extract(Self::figment(path))
    }

    /// Figment provider chain for a config file path.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    fn extract(figment: Figment) -> Self {
        match figment.extract::<Self>() {
            Ok(config) => config.normalized(),
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Clamp values that make no sense as zero.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    /// Apply CLI flags on top of the loaded configuration.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(capacity) = cli.queue_capacity {
            self.queue_capacity = capacity;
        }
        if cli.progress {
            self.progress = true;
        }
        *self = self.clone().normalized();
    }

    /// Pipeline settings derived from this configuration.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
    }

    /// Save the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupesort", "dupesort")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
