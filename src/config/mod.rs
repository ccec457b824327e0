//! Configuration module for dos_guard.
//!
//! Centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use dos_guard::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Enabled: {}", config.detector.enabled);
//! println!("Page threshold: {}", config.detector.page_count);
//! ```

mod detector;
mod error;
mod logging;
mod parse;

pub use detector::DetectorConfig;
pub use error::ConfigError;
pub use logging::LoggingConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Detector configuration.
    pub detector: DetectorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            detector: DetectorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Enabled: {}", self.detector.enabled);
        info!("  Hash table size: {}", self.detector.table_size);
        info!(
            "  Page threshold: {} hits/{}s",
            self.detector.page_count, self.detector.page_interval
        );
        info!(
            "  Site threshold: {} hits/{}s",
            self.detector.site_count, self.detector.site_interval
        );
        info!("  Blocking period: {}s", self.detector.blocking_period);
        info!("  Denial status: {}", self.detector.status);

        if !self.detector.whitelist.is_empty() {
            info!("  Whitelisted IPs: {}", self.detector.whitelist.len());
        }
        if !self.detector.uri_whitelist.is_empty() {
            info!(
                "  Whitelisted URI patterns: {}",
                self.detector.uri_whitelist.len()
            );
        }
        if let Some(ref email) = self.detector.email_notify {
            info!("  Email notification: {}", email);
        }
        if self.detector.system_command.is_some() {
            info!("  System command: configured");
        }
        info!("  Log dir: {:?}", self.detector.log_dir);
    }
}
