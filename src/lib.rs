//! dos_guard - per-request abuse/DoS detection for web servers.
//!
//! This crate decides, once per inbound top-level request, whether the
//! originating client has exceeded configured request-rate thresholds
//! against a specific resource or against the site as a whole, and if so
//! returns a denial verdict and places the client on a temporary hold.
//!
//! # Features
//!
//! - **Hit store**: Fixed-capacity chained hash table with prime bucket
//!   sizing, built for large working sets and sub-millisecond lookups
//! - **Tumbling windows**: Per-resource and per-site counters that reset
//!   on interval expiry
//! - **Holds**: Temporary deny-all state per client, renewed by continued
//!   traffic
//! - **Whitelists**: Exact and wildcard IP entries, plus regex URI patterns
//! - **Block side effects**: Marker file, notification email, external
//!   command, dispatched once per block episode
//! - **Observability**: Structured JSON logging with tracing, Prometheus
//!   metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use dos_guard::config::Config;
//! use dos_guard::{BlockNotifier, Detector, RequestInfo};
//!
//! let config = Config::from_env()?;
//! let detector = Detector::from_config(&config.detector);
//! let notifier = BlockNotifier::from_config(&config.detector);
//!
//! // Per request, on the host's processing path:
//! let verdict = detector.check(&RequestInfo::top_level(client_ip, path));
//! if let Some(status) = verdict.status() {
//!     notifier.record_block(client_ip);
//!     // reject with `status`
//! }
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty when built outside a checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

pub mod config;
pub mod detector;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod whitelist;

// Re-exports for convenience
pub use config::Config;
pub use detector::{Detector, RequestInfo, Verdict};
pub use notify::BlockNotifier;
