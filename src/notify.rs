//! Side effects for newly blocked clients.
//!
//! A persistent marker file `dos-<ip>` under the configured log directory
//! is the once-per-block-episode deduplication: side effects fire only when
//! the marker does not exist yet. While a marker is present, repeat denials
//! for the same client dispatch nothing.
//!
//! The detector never calls into this module; the host drives it after a
//! deny verdict, outside the detector's store lock. All failures here are
//! logged and absorbed, never surfaced to the request path.

use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{error, info, warn};

use crate::config::DetectorConfig;

const MAILER: &str = "/bin/mail";

/// Dispatches the configured block side effects: marker file, notification
/// email, external command.
pub struct BlockNotifier {
    log_dir: PathBuf,
    email_notify: Option<String>,
    system_command: Option<String>,
}

impl BlockNotifier {
    /// Create a notifier with no email or command configured.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            email_notify: None,
            system_command: None,
        }
    }

    /// Build from resolved configuration.
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            log_dir: config.log_dir.clone(),
            email_notify: config.email_notify.clone(),
            system_command: config.system_command.clone(),
        }
    }

    /// Set the notification address.
    pub fn with_email(mut self, address: impl Into<String>) -> Self {
        self.email_notify = Some(address.into());
        self
    }

    /// Set the external command template; `%s` is replaced with the
    /// client IP at dispatch time.
    pub fn with_command(mut self, template: impl Into<String>) -> Self {
        self.system_command = Some(template.into());
        self
    }

    /// Marker file path for a client IP.
    pub fn marker_path(&self, ip: IpAddr) -> PathBuf {
        self.log_dir.join(format!("dos-{}", ip))
    }

    /// Record a block for `ip`, dispatching side effects exactly once per
    /// block episode.
    ///
    /// Returns true when this was the first observation (marker created and
    /// side effects dispatched), false when the marker already existed or
    /// could not be created.
    pub fn record_block(&self, ip: IpAddr) -> bool {
        let marker = self.marker_path(ip);
        if marker.exists() {
            return false;
        }

        let contents = format!("{}\n", std::process::id());
        if let Err(err) = fs::write(&marker, contents) {
            error!(
                marker = %marker.display(),
                error = %err,
                "could not create block marker"
            );
            return false;
        }

        info!(
            target: "block",
            ip = %ip,
            "blacklisting address: possible DoS attack"
        );

        if let Some(address) = &self.email_notify {
            self.send_mail(address, ip);
        }
        if let Some(template) = &self.system_command {
            self.run_command(template, ip);
        }

        true
    }

    /// Pipe a notification into the mailer.
    fn send_mail(&self, address: &str, ip: IpAddr) {
        let child = Command::new(MAILER)
            .arg(address)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(err) => {
                warn!(error = %err, "failed to spawn mailer");
                return;
            }
        };

        if let Some(stdin) = child.stdin.as_mut() {
            let body = format!(
                "To: {}\nSubject: HTTP BLACKLIST {}\n\nBlacklisted {}\n",
                address, ip, ip
            );
            if let Err(err) = stdin.write_all(body.as_bytes()) {
                warn!(error = %err, "failed to write notification body");
            }
        }

        match child.wait() {
            Ok(status) if !status.success() => {
                warn!(status = %status, "mailer exited with failure");
            }
            Err(err) => warn!(error = %err, "failed to wait on mailer"),
            _ => {}
        }
    }

    /// Run the external command template with the client IP substituted.
    fn run_command(&self, template: &str, ip: IpAddr) {
        let command = template.replace("%s", &ip.to_string());
        match Command::new("/bin/sh").arg("-c").arg(&command).status() {
            Ok(status) if !status.success() => {
                warn!(status = %status, "block command exited with failure");
            }
            Err(err) => warn!(error = %err, "failed to run block command"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8))
    }

    #[test]
    fn test_first_block_creates_marker() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = BlockNotifier::new(dir.path());

        assert!(notifier.record_block(ip()));

        let marker = dir.path().join("dos-5.6.7.8");
        assert!(marker.exists());
        let contents = fs::read_to_string(marker).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_repeat_block_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = BlockNotifier::new(dir.path());

        assert!(notifier.record_block(ip()));
        assert!(!notifier.record_block(ip()));
        assert!(!notifier.record_block(ip()));
    }

    #[test]
    fn test_distinct_clients_get_distinct_markers() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = BlockNotifier::new(dir.path());

        assert!(notifier.record_block(ip()));
        assert!(notifier.record_block(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))));
        assert!(dir.path().join("dos-5.6.7.8").exists());
        assert!(dir.path().join("dos-9.9.9.9").exists());
    }

    #[test]
    fn test_unwritable_dir_fails_open() {
        let notifier = BlockNotifier::new("/nonexistent/dir");
        assert!(!notifier.record_block(ip()));
    }

    #[test]
    fn test_command_substitution_runs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("blocked.txt");
        let notifier = BlockNotifier::new(dir.path())
            .with_command(format!("echo %s > {}", out.display()));

        assert!(notifier.record_block(ip()));
        let contents = fs::read_to_string(out).unwrap();
        assert_eq!(contents.trim(), "5.6.7.8");
    }
}
