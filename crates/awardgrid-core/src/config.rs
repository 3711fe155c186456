//! Configuration management for Awardgrid.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/awardgrid/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Browser page pool settings
    pub pool: PoolConfig,
    /// Search orchestration settings
    pub search: SearchConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Airline producer settings
    pub airlines: AirlineConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `AWARDGRID_PORT`: Override the HTTP listen port
    /// - `AWARDGRID_HEADLESS`: Override browser headless mode (true/false)
    /// - `AWARDGRID_MAX_BROWSERS`: Override the browser process cap
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("AWARDGRID_PORT") {
            if let Ok(port) = val.parse() {
                config.server.port = port;
                tracing::debug!("Override server.port from env: {}", port);
            }
        }

        if let Ok(val) = std::env::var("AWARDGRID_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("AWARDGRID_MAX_BROWSERS") {
            if let Ok(max) = val.parse() {
                config.pool.max_browsers = max;
                tracing::debug!("Override pool.max_browsers from env: {}", max);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/awardgrid/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("io", "awardgrid", "awardgrid").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Validate cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns error for zero capacities or out-of-range rates.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.max_browsers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.max_browsers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool.max_pages_per_browser == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.max_pages_per_browser".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.sample_stride == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.sample_stride".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.airlines.simulated_failure_rate) {
            return Err(ConfigError::InvalidValue {
                field: "airlines.simulated_failure_rate".to_string(),
                reason: "must be within 0.0..=1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Browser page pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of browser processes
    pub max_browsers: usize,
    /// Maximum pages hosted by each browser process
    pub max_pages_per_browser: usize,
    /// Pages opened ahead of demand at startup
    pub prewarm_pages: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: 3,
            max_pages_per_browser: 4,
            prewarm_pages: 2,
        }
    }
}

/// Search orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Attempts per task before giving up
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds (doubled per failed attempt)
    pub base_delay_ms: u64,
    /// Date grid sampling stride: a cell at (row, col) is searched when
    /// `(row + col) % sample_stride == 0`
    pub sample_stride: usize,
    /// Overall wall-clock budget for one run in seconds (0 = unbounded)
    pub run_deadline_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            sample_stride: 4,
            run_deadline_secs: 600,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
        }
    }
}

/// Airline producer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlineConfig {
    /// Number of simulated airlines registered at startup
    pub simulated_airlines: u32,
    /// Failure rate for simulated searches (0.0..=1.0)
    pub simulated_failure_rate: f64,
    /// Register the British Airways producer (drives a real site)
    pub enable_british_airways: bool,
    /// Directory of airline definition TOML files; built-in definitions
    /// are used when unset
    pub definitions_dir: Option<PathBuf>,
}

impl Default for AirlineConfig {
    fn default() -> Self {
        Self {
            simulated_airlines: 3,
            simulated_failure_rate: 0.15,
            enable_british_airways: false,
            definitions_dir: None,
        }
    }
}
