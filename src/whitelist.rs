//! Whitelist short-circuits for the classifier.
//!
//! IP entries live in the hit store under [`StoreKey::WhitelistIp`], seeded
//! once at configuration time; a request IP is tested against its exact
//! textual form and then the three IPv4 wildcard prefixes. URI patterns are
//! compiled once; a pattern that fails to compile is dropped with a warning
//! and the rest still apply.

use std::net::IpAddr;

use regex::Regex;
use tracing::warn;

use crate::store::{HitStore, StoreKey};

/// Load configured whitelist entries (literal IPs or wildcard patterns such
/// as `10.1.*.*`) into the store. The timestamp is side data only.
pub fn seed_ip_whitelist(store: &mut HitStore, entries: &[String], now: u64) {
    for entry in entries {
        let _ = store.insert_or_touch(StoreKey::WhitelistIp(entry.clone()), now);
    }
}

/// Test a client IP against the seeded whitelist entries.
///
/// Order: exact match, then `a.*.*.*`, `a.b.*.*`, `a.b.c.*`. First hit
/// wins. IPv6 clients match by exact form only; the wildcard shapes are
/// IPv4 by construction.
pub fn is_ip_whitelisted(store: &HitStore, ip: IpAddr) -> bool {
    if store
        .find(&StoreKey::WhitelistIp(ip.to_string()))
        .is_some()
    {
        return true;
    }

    if let IpAddr::V4(v4) = ip {
        let [a, b, c, _] = v4.octets();
        let candidates = [
            format!("{}.*.*.*", a),
            format!("{}.{}.*.*", a, b),
            format!("{}.{}.{}.*", a, b, c),
        ];
        for candidate in candidates {
            if store.find(&StoreKey::WhitelistIp(candidate)).is_some() {
                return true;
            }
        }
    }

    false
}

/// Ordered list of compiled request-path patterns.
pub struct UriWhitelist {
    patterns: Vec<Regex>,
}

impl UriWhitelist {
    /// Compile the configured pattern list. Patterns that fail to compile
    /// are logged and discarded; startup continues with the rest.
    pub fn compile(patterns: &[String]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            match Regex::new(pattern) {
                Ok(re) => compiled.push(re),
                Err(err) => {
                    warn!(
                        pattern = %pattern,
                        error = %err,
                        "dropping URI whitelist pattern that failed to compile"
                    );
                }
            }
        }
        Self { patterns: compiled }
    }

    /// First matching pattern wins; an empty list never matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    /// Number of successfully compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
