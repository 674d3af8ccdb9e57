// src/config.rs

//! Runtime configuration
//!
//! Settings come from an optional TOML file, then command-line overrides.
//! The resulting [`Config`] is passed explicitly to whatever needs it; there
//! is no global state.
//!
//! ```toml
//! # Log level: error, warn, info, debug or trace
//! log_level = "debug"
//! # History files, as a path or glob
//! path = "/var/log/apt/history*"
//! # Mirror log output into this file
//! log_file = "/var/log/metapurge.log"
//! # Concurrent reverse-dependency lookups (0 = one per CPU)
//! jobs = 4
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/metapurge/config.toml";

/// Default apt history location
pub const DEFAULT_HISTORY_PATH: &str = "/var/log/apt/history*";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Upper bound for the `jobs` setting
pub const MAX_JOBS: usize = 64;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// On-disk shape of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    log_level: Option<String>,
    path: Option<String>,
    log_file: Option<PathBuf>,
    jobs: Option<usize>,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Lower-case tracing level
    pub log_level: String,
    /// History file path or glob
    pub path: String,
    /// Optional log file mirroring console output
    pub log_file: Option<PathBuf>,
    /// Concurrent reverse-dependency lookups
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            path: DEFAULT_HISTORY_PATH.to_string(),
            log_file: None,
            jobs: 0,
        }
    }
}

impl Config {
    /// Load configuration from `path`
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// read, parsed or validated is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration file at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        // Unknown keys are rejected with the list of valid ones
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string().trim().to_string()))?;

        let mut config = Self::default();

        if let Some(level) = raw.log_level {
            config.log_level = validate_log_level(&level)?;
        }

        if let Some(path) = raw.path {
            glob::Pattern::new(&path)
                .map_err(|e| Error::Config(format!("path '{}' is not a valid glob: {}", path, e)))?;
            config.path = path;
        }

        if let Some(file) = raw.log_file {
            if !file.as_os_str().is_empty() {
                config.log_file = Some(file);
            }
        }

        if let Some(jobs) = raw.jobs {
            if jobs > MAX_JOBS {
                return Err(Error::Config(format!(
                    "jobs = {} is out of range (0-{})",
                    jobs, MAX_JOBS
                )));
            }
            config.jobs = jobs;
        }

        Ok(config)
    }

    /// Check that the history path names at least one file
    pub fn check_history_path(&self) -> Result<()> {
        let mut matches = glob::glob(&self.path)?;
        if matches.any(|entry| entry.map(|p| p.is_file()).unwrap_or(false)) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "path '{}' does not match any history file",
                self.path
            )))
        }
    }
}

/// Normalise and check a log level name
pub fn validate_log_level(level: &str) -> Result<String> {
    let level = level.to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(Error::Config(format!(
            "log_level '{}' is not recognised; choose one of {}",
            level,
            LOG_LEVELS.join(", ")
        )))
    }
}
