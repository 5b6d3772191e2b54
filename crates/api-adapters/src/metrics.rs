//! Process counters exposed at `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

pub struct Metrics {
    registry: Registry,
    pub searches: Counter,
    pub reports: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let searches = Counter::default();
        let reports = Counter::default();
        registry.register("souk_searches", "Search requests served", searches.clone());
        registry.register("souk_reports", "Abuse reports accepted", reports.clone());
        Self {
            registry,
            searches,
            reports,
        }
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        encode(&mut out, &self.registry).unwrap_or_default();
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
