//! Prometheus metrics for dos_guard.
//!
//! Counts classifications by verdict, hold escalations, whitelist
//! short-circuits, and current store occupancy.

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

/// Prometheus metrics registry with all detector metrics.
pub struct Metrics {
    registry: Registry,

    /// Classifications by verdict (`pass`, `deny`)
    pub checks_total: CounterVec,

    /// Hold escalations (client entered the blocked state)
    pub holds_total: Counter,

    /// Whitelist short-circuits by kind (`ip`, `uri`)
    pub whitelist_hits_total: CounterVec,

    /// Entries currently tracked in the hit store
    pub tracked_entries: Gauge,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checks_total = CounterVec::new(
            Opts::new("dos_guard_checks_total", "Total request classifications"),
            &["verdict"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let holds_total = Counter::new(
            "dos_guard_holds_total",
            "Total hold escalations (clients entering the blocked state)",
        )?;
        registry.register(Box::new(holds_total.clone()))?;

        let whitelist_hits_total = CounterVec::new(
            Opts::new(
                "dos_guard_whitelist_hits_total",
                "Requests short-circuited by a whitelist",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(whitelist_hits_total.clone()))?;

        let tracked_entries = Gauge::new(
            "dos_guard_tracked_entries",
            "Entries currently tracked in the hit store",
        )?;
        registry.register(Box::new(tracked_entries.clone()))?;

        Ok(Self {
            registry,
            checks_total,
            holds_total,
            whitelist_hits_total,
            tracked_entries,
        })
    }

    /// Record a classification outcome.
    pub fn record_check(&self, verdict: &str) {
        self.checks_total.with_label_values(&[verdict]).inc();
    }

    /// Record a hold escalation.
    pub fn record_hold(&self) {
        self.holds_total.inc();
    }

    /// Record a whitelist short-circuit.
    pub fn record_whitelist_hit(&self, kind: &str) {
        self.whitelist_hits_total.with_label_values(&[kind]).inc();
    }

    /// Update the store occupancy gauge.
    pub fn set_tracked_entries(&self, count: usize) {
        self.tracked_entries.set(count as f64);
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Invalid UTF-8 in metrics")
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
