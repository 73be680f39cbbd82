//! Configuration infrastructure
//!
//! Configuration is organized into two tiers:
//! 1. User-facing settings (batch size, output locations, logging)
//! 2. Advanced settings (timeouts, rate limits, site endpoints)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-facing settings
    pub user: UserConfig,

    /// Advanced settings (config file only)
    pub advanced: AdvancedConfig,
}

/// Settings a user is expected to touch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Items requested per page. Batches above 100 are refused by the
    /// endpoint in practice.
    pub batch_size: u32,

    /// Directory output files and diagnostics are written into
    pub output_dir: PathBuf,

    /// Stem of the output file pair (`<stem>.txt` and `<stem>.csv`)
    pub output_stem: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Advanced settings that rarely need changing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Timeout for a single HTTP request in seconds
    pub request_timeout_seconds: u64,

    /// Budget for one automation phase in seconds. A phase exceeding this is
    /// treated as a stuck run and aborts the process.
    pub phase_timeout_seconds: u64,

    /// Request rate cap
    pub max_requests_per_second: u32,

    /// User agent presented to the site. Must look like a desktop browser or
    /// the session cookies are withheld.
    pub user_agent: String,

    /// Site endpoints
    pub site: SiteConfig,
}

/// Fixed site entry points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Storefront landing page; loading it triggers the sign-in redirect
    pub home_url: String,

    /// Content-and-devices page that issues the anti-forgery token
    pub devices_url: String,

    /// Ownership-query endpoint the page requests are posted to
    pub ownership_query_url: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output under logs/
    pub file_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: UserConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            output_dir: PathBuf::from("."),
            output_stem: defaults::OUTPUT_STEM.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            phase_timeout_seconds: defaults::PHASE_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            site: SiteConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: defaults::HOME_URL.to_string(),
            devices_url: defaults::DEVICES_URL.to_string(),
            ownership_query_url: defaults::OWNERSHIP_QUERY_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: true,
        }
    }
}

impl AppConfig {
    /// Validate values that have hard external constraints.
    pub fn validate(&self) -> Result<()> {
        if self.user.batch_size == 0 || self.user.batch_size > defaults::MAX_BATCH_SIZE {
            anyhow::bail!(
                "batch_size must be between 1 and {}, got {}",
                defaults::MAX_BATCH_SIZE,
                self.user.batch_size
            );
        }
        if self.advanced.phase_timeout_seconds == 0 {
            anyhow::bail!("phase_timeout_seconds must be greater than 0");
        }
        Ok(())
    }
}

/// Loads and saves the configuration file
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default per-user config location.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not determine user configuration directory")?
            .join("kindle-shelf");
        Ok(Self {
            config_path: config_dir.join("kindle_shelf_config.json"),
        })
    }

    /// Manager for an explicit config file path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load the configuration, creating a default file on first run. A file
    /// that no longer parses is backed up and replaced with defaults rather
    /// than aborting the run.
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Configuration file not found, creating default: {:?}",
                self.config_path
            );
            let config = AppConfig::default();
            self.save(&config).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                config.validate()?;
                Ok(config)
            }
            Err(e) => {
                warn!("Configuration file is corrupted ({}), restoring defaults", e);
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to back up corrupted config: {}", copy_err);
                }
                let config = AppConfig::default();
                self.save(&config)
                    .await
                    .context("Failed to save default configuration")?;
                Ok(config)
            }
        }
    }

    /// Save the configuration, creating parent directories as needed.
    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
        }

        let content = serde_json::to_string_pretty(config)
            .context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    /// Default items per page request
    pub const BATCH_SIZE: u32 = crate::domain::fetch::DEFAULT_BATCH_SIZE;

    /// Largest batch the endpoint accepts in practice
    pub const MAX_BATCH_SIZE: u32 = 100;

    /// Default stem of the output file pair
    pub const OUTPUT_STEM: &str = "booklist";

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default budget for one automation phase
    pub const PHASE_TIMEOUT_SECONDS: u64 = 180;

    /// Default request rate cap
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Desktop Chrome user agent. The site does not issue the session
    /// cookies needed by the ownership query to unknown agents.
    pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Storefront landing page
    pub const HOME_URL: &str = "https://www.amazon.co.uk/gp/yourstore/home/ref=nav_cs_ys";

    /// Content-and-devices page that issues the anti-forgery token
    pub const DEVICES_URL: &str =
        "https://www.amazon.co.uk/mn/dcw/myx.html/ref=kinw_myk_redirect#/home/content/booksAll/dateDsc/";

    /// Ownership-query endpoint
    pub const OWNERSHIP_QUERY_URL: &str = "https://www.amazon.co.uk/mn/dcw/myx/ajax-activity";
}
