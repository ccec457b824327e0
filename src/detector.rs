//! Per-request rate classification.
//!
//! The detector is invoked once per top-level request and decides whether
//! the client has exceeded the per-resource or per-site thresholds, or is
//! already serving a hold. State lives in a [`HitStore`] behind a single
//! mutex scoped to the detector; the lock is held for the duration of one
//! classification and never across side-effect dispatch.
//!
//! A client's state is implicit in its entries: unseen, inside an active
//! window, or held. A hold is renewed by continued traffic within the
//! blocking period, so a client that keeps hammering stays blocked.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use http::StatusCode;

use crate::config::DetectorConfig;
use crate::metrics::Metrics;
use crate::store::{HitStore, StoreKey};
use crate::whitelist::{is_ip_whitelisted, seed_ip_whitelist, UriWhitelist};

/// Per-request input from the host server.
#[derive(Clone, Copy, Debug)]
pub struct RequestInfo<'a> {
    /// Originating client address, as resolved by the host stack.
    pub client_ip: IpAddr,
    /// Request path.
    pub path: &'a str,
    /// False for subrequests and internal redirects; those are never
    /// classified.
    pub top_level: bool,
}

impl<'a> RequestInfo<'a> {
    /// A top-level request.
    pub fn top_level(client_ip: IpAddr, path: &'a str) -> Self {
        Self {
            client_ip,
            path,
            top_level: true,
        }
    }
}

/// Classification outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Serve the request normally.
    Pass,
    /// Reject with the configured status code.
    Deny(StatusCode),
}

impl Verdict {
    /// Check if this verdict denies the request.
    pub fn is_deny(&self) -> bool {
        matches!(self, Verdict::Deny(_))
    }

    /// The denial status code, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Verdict::Pass => None,
            Verdict::Deny(status) => Some(*status),
        }
    }
}

/// Rate classifier for one configuration scope.
///
/// Holds the scope's hit store, compiled URI whitelist, and thresholds.
/// Configuration is immutable once the detector is built; the store is
/// released when the detector is dropped at scope teardown.
pub struct Detector {
    enabled: bool,
    store: Mutex<HitStore>,
    uri_whitelist: UriWhitelist,
    page_count: u64,
    page_interval: u64,
    site_count: u64,
    site_interval: u64,
    blocking_period: u64,
    status: StatusCode,
    metrics: Metrics,
}

impl Detector {
    /// Build a detector from resolved configuration: sizes the store,
    /// seeds the IP whitelist entries, and compiles the URI patterns.
    pub fn from_config(config: &DetectorConfig) -> Self {
        let mut store = HitStore::with_capacity(config.table_size);
        seed_ip_whitelist(&mut store, &config.whitelist, unix_now());

        Self {
            enabled: config.enabled,
            store: Mutex::new(store),
            uri_whitelist: UriWhitelist::compile(&config.uri_whitelist),
            page_count: config.page_count,
            page_interval: config.page_interval,
            site_count: config.site_count,
            site_interval: config.site_interval,
            blocking_period: config.blocking_period,
            status: config.status,
            metrics: Metrics::default(),
        }
    }

    /// Classify a request against the current wall clock.
    pub fn check(&self, request: &RequestInfo<'_>) -> Verdict {
        self.check_at(request, unix_now())
    }

    /// Classify a request at an explicit timestamp (integer seconds).
    ///
    /// Evaluation order: IP whitelist, active hold, URI whitelist,
    /// per-resource window, per-site window. A whitelisted IP never touches
    /// a counter; a URI match passes an active window but does not override
    /// a hold.
    pub fn check_at(&self, request: &RequestInfo<'_>, now: u64) -> Verdict {
        if !self.enabled || !request.top_level {
            return Verdict::Pass;
        }

        let mut store = self.store.lock().unwrap();

        if is_ip_whitelisted(&store, request.client_ip) {
            self.metrics.record_whitelist_hit("ip");
            self.metrics.record_check("pass");
            return Verdict::Pass;
        }

        let client_key = StoreKey::Client(request.client_ip);
        let mut verdict = Verdict::Pass;

        let held = match store.find_mut(&client_key) {
            Some(entry) if now.saturating_sub(entry.last_seen) < self.blocking_period => {
                // Continued traffic renews the hold
                entry.last_seen = now;
                true
            }
            _ => false,
        };

        if held {
            verdict = Verdict::Deny(self.status);
        } else {
            if self.uri_whitelist.is_match(request.path) {
                self.metrics.record_whitelist_hit("uri");
                self.metrics.record_check("pass");
                self.metrics.set_tracked_entries(store.len());
                return Verdict::Pass;
            }

            let resource_tripped = run_window(
                &mut store,
                StoreKey::Resource {
                    client: request.client_ip,
                    path: request.path.to_string(),
                },
                self.page_count,
                self.page_interval,
                now,
            );

            let site_tripped = run_window(
                &mut store,
                StoreKey::Site(request.client_ip),
                self.site_count,
                self.site_interval,
                now,
            );

            if resource_tripped || site_tripped {
                // Threshold breach escalates to a hold on the bare client
                let _ = store.insert_or_touch(client_key, now);
                self.metrics.record_hold();
                verdict = Verdict::Deny(self.status);

                tracing::info!(
                    target: "block",
                    ip = %request.client_ip,
                    path = request.path,
                    resource = resource_tripped,
                    site = site_tripped,
                    "rate threshold exceeded, client placed on hold"
                );
            }
        }

        self.metrics.set_tracked_entries(store.len());
        drop(store);

        match verdict {
            Verdict::Pass => self.metrics.record_check("pass"),
            Verdict::Deny(status) => {
                self.metrics.record_check("deny");
                tracing::debug!(
                    ip = %request.client_ip,
                    path = request.path,
                    status = status.as_u16(),
                    "request denied"
                );
            }
        }

        verdict
    }

    /// Whether classification is active for this scope.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Entries currently tracked (whitelist seeds included).
    pub fn tracked_entries(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Detector metrics, for export by the host.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// One tumbling-window evaluation.
///
/// Returns true when the key is still inside its interval and the count has
/// reached the threshold. A lapsed interval zeroes the count (tumbling
/// rollover). In all cases the entry ends up with `last_seen = now` and the
/// count incremented by one for this hit.
fn run_window(
    store: &mut HitStore,
    key: StoreKey,
    threshold: u64,
    interval: u64,
    now: u64,
) -> bool {
    if let Some(entry) = store.find_mut(&key) {
        let age = now.saturating_sub(entry.last_seen);
        let tripped = age < interval && entry.count >= threshold;
        if !tripped && age >= interval {
            entry.count = 0;
        }
        entry.last_seen = now;
        entry.count += 1;
        tripped
    } else {
        // Capacity exhaustion leaves the key untracked: fail open
        if let Some(entry) = store.insert_or_touch(key, now) {
            entry.count += 1;
        }
        false
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(1, 2, 3, last))
    }

    fn detector(config: DetectorConfig) -> Detector {
        Detector::from_config(&config)
    }

    fn base_config() -> DetectorConfig {
        DetectorConfig {
            enabled: true,
            page_count: 2,
            page_interval: 1,
            site_count: 50,
            site_interval: 1,
            blocking_period: 10,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_disabled_detector_always_passes() {
        let det = detector(DetectorConfig {
            enabled: false,
            ..base_config()
        });
        let req = RequestInfo::top_level(ip(4), "/x");

        for t in 0..20 {
            assert_eq!(det.check_at(&req, t), Verdict::Pass);
        }
    }

    #[test]
    fn test_subrequests_are_not_classified() {
        let det = detector(base_config());
        let req = RequestInfo {
            client_ip: ip(4),
            path: "/x",
            top_level: false,
        };

        for _ in 0..10 {
            assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        }
        // Nothing was tracked
        assert_eq!(det.tracked_entries(), 0);
    }

    #[test]
    fn test_three_rapid_hits_deny_on_third() {
        // pageCount=2, pageInterval=1, t=0,0,0 -> pass, pass, deny
        let det = detector(base_config());
        let req = RequestInfo::top_level(ip(4), "/x");

        assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        assert_eq!(
            det.check_at(&req, 0),
            Verdict::Deny(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let det = detector(base_config());
        let req = RequestInfo::top_level(ip(4), "/x");

        assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        // Interval elapsed before the third hit: count tumbles to zero
        assert_eq!(det.check_at(&req, 1), Verdict::Pass);
        assert_eq!(det.check_at(&req, 1), Verdict::Pass);
        assert_eq!(
            det.check_at(&req, 1),
            Verdict::Deny(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn test_hold_renewed_by_continued_traffic() {
        let det = detector(base_config());
        let req = RequestInfo::top_level(ip(4), "/x");

        det.check_at(&req, 0);
        det.check_at(&req, 0);
        assert!(det.check_at(&req, 0).is_deny());

        // Each request inside the blocking period extends the hold, even on
        // a path that never tripped anything
        let other = RequestInfo::top_level(ip(4), "/y");
        assert!(det.check_at(&other, 9).is_deny());
        assert!(det.check_at(&other, 18).is_deny());

        // A gap of a full blocking period lets the hold lapse
        assert_eq!(det.check_at(&other, 28), Verdict::Pass);
    }

    #[test]
    fn test_hold_lapses_after_quiet_period() {
        let det = detector(base_config());
        let req = RequestInfo::top_level(ip(4), "/x");

        det.check_at(&req, 0);
        det.check_at(&req, 0);
        assert!(det.check_at(&req, 0).is_deny());

        assert_eq!(
            det.check_at(&RequestInfo::top_level(ip(4), "/y"), 10),
            Verdict::Pass
        );
    }

    #[test]
    fn test_site_window_independent_of_resource() {
        let det = detector(DetectorConfig {
            page_count: 1000, // effectively off
            site_count: 3,
            site_interval: 1,
            ..base_config()
        });

        // Distinct paths so no per-resource window trips
        assert_eq!(
            det.check_at(&RequestInfo::top_level(ip(4), "/a"), 0),
            Verdict::Pass
        );
        assert_eq!(
            det.check_at(&RequestInfo::top_level(ip(4), "/b"), 0),
            Verdict::Pass
        );
        assert_eq!(
            det.check_at(&RequestInfo::top_level(ip(4), "/c"), 0),
            Verdict::Pass
        );
        assert!(det
            .check_at(&RequestInfo::top_level(ip(4), "/d"), 0)
            .is_deny());
    }

    #[test]
    fn test_whitelisted_ip_never_counted() {
        let det = detector(DetectorConfig {
            whitelist: vec!["1.2.3.4".to_string()],
            ..base_config()
        });
        let seeded = det.tracked_entries();
        let req = RequestInfo::top_level(ip(4), "/x");

        for t in 0..100 {
            assert_eq!(det.check_at(&req, t / 10), Verdict::Pass);
        }
        // No window or hold entries appeared
        assert_eq!(det.tracked_entries(), seeded);
    }

    #[test]
    fn test_wildcard_whitelist_applies() {
        let det = detector(DetectorConfig {
            whitelist: vec!["1.2.*.*".to_string()],
            ..base_config()
        });
        let req = RequestInfo::top_level(ip(9), "/x");

        for _ in 0..10 {
            assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        }
    }

    #[test]
    fn test_uri_whitelist_skips_counting() {
        let det = detector(DetectorConfig {
            uri_whitelist: vec!["^/healthz$".to_string()],
            ..base_config()
        });
        let req = RequestInfo::top_level(ip(4), "/healthz");

        for _ in 0..10 {
            assert_eq!(det.check_at(&req, 0), Verdict::Pass);
        }
        assert_eq!(det.tracked_entries(), 0);
    }

    #[test]
    fn test_uri_whitelist_does_not_override_hold() {
        let det = detector(DetectorConfig {
            uri_whitelist: vec!["^/healthz$".to_string()],
            ..base_config()
        });
        let req = RequestInfo::top_level(ip(4), "/x");

        det.check_at(&req, 0);
        det.check_at(&req, 0);
        assert!(det.check_at(&req, 0).is_deny());

        // Hold check runs before the URI whitelist
        assert!(det
            .check_at(&RequestInfo::top_level(ip(4), "/healthz"), 1)
            .is_deny());
    }

    #[test]
    fn test_configured_status_code_is_returned() {
        let det = detector(DetectorConfig {
            status: StatusCode::TOO_MANY_REQUESTS,
            ..base_config()
        });
        let req = RequestInfo::top_level(ip(4), "/x");

        det.check_at(&req, 0);
        det.check_at(&req, 0);
        assert_eq!(
            det.check_at(&req, 0),
            Verdict::Deny(StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[test]
    fn test_clients_tracked_independently() {
        let det = detector(base_config());

        let a = RequestInfo::top_level(ip(4), "/x");
        let b = RequestInfo::top_level(ip(5), "/x");

        det.check_at(&a, 0);
        det.check_at(&a, 0);
        assert!(det.check_at(&a, 0).is_deny());

        // Another client on the same path is unaffected
        assert_eq!(det.check_at(&b, 0), Verdict::Pass);
    }

    #[test]
    fn test_metrics_reflect_verdicts() {
        let det = detector(base_config());
        let req = RequestInfo::top_level(ip(4), "/x");

        det.check_at(&req, 0);
        det.check_at(&req, 0);
        det.check_at(&req, 0);

        let output = det.metrics().export();
        assert!(output.contains("dos_guard_checks_total"));
        assert!(output.contains("verdict=\"deny\""));
        assert!(output.contains("dos_guard_holds_total"));
    }
}
