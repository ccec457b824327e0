//! Detector configuration.

use std::path::PathBuf;

use http::StatusCode;

use super::parse::{env_bool, env_duration, env_opt, env_or, env_parse};
use super::ConfigError;

const DEFAULT_TABLE_SIZE: usize = 3097;
const DEFAULT_PAGE_COUNT: u64 = 2;
const DEFAULT_PAGE_INTERVAL: u64 = 1;
const DEFAULT_SITE_COUNT: u64 = 50;
const DEFAULT_SITE_INTERVAL: u64 = 1;
const DEFAULT_BLOCKING_PERIOD: u64 = 10;
const DEFAULT_LOG_DIR: &str = "/tmp";

/// Detector configuration loaded from environment.
///
/// Immutable once a detector has been built from it. One instance per
/// configuration scope; scopes may differ (e.g. per virtual host).
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    /// Classification enabled for this scope.
    pub enabled: bool,
    /// Hit store capacity hint (resolved to a prime table size).
    pub table_size: usize,
    /// Max hits per resource per interval before a hold.
    pub page_count: u64,
    /// Per-resource window length in seconds.
    pub page_interval: u64,
    /// Max hits site-wide per interval before a hold.
    pub site_count: u64,
    /// Per-site window length in seconds.
    pub site_interval: u64,
    /// Hold duration in seconds, renewed by continued traffic.
    pub blocking_period: u64,
    /// Status code returned for denied requests.
    pub status: StatusCode,
    /// Whitelisted client IPs, literal or IPv4 wildcard (`10.1.*.*`).
    pub whitelist: Vec<String>,
    /// Whitelisted request-path patterns (regex).
    pub uri_whitelist: Vec<String>,
    /// Directory for block marker files.
    pub log_dir: PathBuf,
    /// Notification address, passed to the mailer untouched.
    pub email_notify: Option<String>,
    /// External command template; `%s` is replaced with the client IP.
    pub system_command: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table_size: DEFAULT_TABLE_SIZE,
            page_count: DEFAULT_PAGE_COUNT,
            page_interval: DEFAULT_PAGE_INTERVAL,
            site_count: DEFAULT_SITE_COUNT,
            site_interval: DEFAULT_SITE_INTERVAL,
            blocking_period: DEFAULT_BLOCKING_PERIOD,
            status: StatusCode::FORBIDDEN,
            whitelist: Vec::new(),
            uri_whitelist: Vec::new(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            email_notify: None,
            system_command: None,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Zero or unset numeric values select the defaults; intervals accept
    /// the duration syntax ("10s", "2m", plain seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        let table_size: usize = env_parse("DOS_HASH_TABLE_SIZE", 0)?;
        let page_count: u64 = env_parse("DOS_PAGE_COUNT", 0)?;
        let site_count: u64 = env_parse("DOS_SITE_COUNT", 0)?;

        let page_interval = env_duration("DOS_PAGE_INTERVAL", "0")?
            .map(|d| d.as_secs())
            .unwrap_or(DEFAULT_PAGE_INTERVAL);
        let site_interval = env_duration("DOS_SITE_INTERVAL", "0")?
            .map(|d| d.as_secs())
            .unwrap_or(DEFAULT_SITE_INTERVAL);
        let blocking_period = env_duration("DOS_BLOCKING_PERIOD", "0")?
            .map(|d| d.as_secs())
            .unwrap_or(DEFAULT_BLOCKING_PERIOD);

        let status_raw: u16 = env_parse("DOS_HTTP_STATUS", 0)?;
        let status = if status_raw == 0 {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::from_u16(status_raw).map_err(|_| ConfigError::Invalid {
                key: "DOS_HTTP_STATUS".into(),
                message: format!("{} is not a valid HTTP status code", status_raw),
            })?
        };

        Ok(Self {
            enabled: env_bool("DOS_ENABLED", false),
            table_size: if table_size == 0 {
                DEFAULT_TABLE_SIZE
            } else {
                table_size
            },
            page_count: if page_count == 0 {
                DEFAULT_PAGE_COUNT
            } else {
                page_count
            },
            page_interval,
            site_count: if site_count == 0 {
                DEFAULT_SITE_COUNT
            } else {
                site_count
            },
            site_interval,
            blocking_period,
            status,
            whitelist: split_list(&env_or("DOS_WHITELIST", "")),
            uri_whitelist: split_list(&env_or("DOS_WHITELIST_URI", "")),
            log_dir: PathBuf::from(env_or("DOS_LOG_DIR", DEFAULT_LOG_DIR)),
            email_notify: env_opt("DOS_EMAIL_NOTIFY"),
            system_command: env_opt("DOS_SYSTEM_COMMAND"),
        })
    }
}

/// Split a whitespace-separated list value.
fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();

        assert!(!config.enabled);
        assert_eq!(config.table_size, 3097);
        assert_eq!(config.page_count, 2);
        assert_eq!(config.page_interval, 1);
        assert_eq!(config.site_count, 50);
        assert_eq!(config.site_interval, 1);
        assert_eq!(config.blocking_period, 10);
        assert_eq!(config.status, StatusCode::FORBIDDEN);
        assert!(config.whitelist.is_empty());
        assert!(config.uri_whitelist.is_empty());
        assert_eq!(config.log_dir, PathBuf::from("/tmp"));
        assert!(config.email_notify.is_none());
        assert!(config.system_command.is_none());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("127.0.0.1 10.0.*.*"),
            vec!["127.0.0.1".to_string(), "10.0.*.*".to_string()]
        );
        assert!(split_list("").is_empty());
        assert!(split_list("   ").is_empty());
    }
}
